// Core modules implementing the value model, registry, codec, and errors.
pub mod builtin;
pub mod codec;
pub mod error;
pub mod legacy;
pub mod registry;
pub(crate) mod unpickle;
pub mod value;
