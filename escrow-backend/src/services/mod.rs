//! Chain access and instruction assembly

pub mod instruction_builder;
pub mod offer_reader;

pub use instruction_builder::{InstructionBuilder, MakeOfferParams};
pub use offer_reader::{OfferReader, RpcAccountReader};
