pub mod assembler;
pub mod buffer_pool;
pub mod catalog;
pub mod conditional;
pub mod headers;
pub mod response;
pub mod site_service;

#[cfg(test)]
pub(crate) mod test_support;
