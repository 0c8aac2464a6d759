//! IO machinery: the bounded fetch loop, its HTTP implementation, and the managed runtime
//! thread it runs on.

pub(crate) mod fetch;
pub(crate) mod http;
pub(crate) mod runtime;
