// The request form and the generated result.
pub mod form;
pub mod result;
