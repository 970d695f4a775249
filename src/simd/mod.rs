//! Kernel handles and runtime dispatch
//!
//! Compile-time availability of a kernel and runtime selection of it are
//! separate: [`CopyKernel::is_compiled`] reports the first, the
//! [`Dispatcher`] decides the second from detected capabilities.

pub mod dispatch;
pub mod kernel;

pub use dispatch::{best_kernel, select_kernel, Dispatcher, Strategy};
pub use kernel::CopyKernel;
