//! Document type metadata.

mod class;
mod discriminator;
mod field;
mod registry;

pub use class::{ClassDiscriminator, ClassMetadata, IdentifierStrategy};
pub use discriminator::DiscriminatorMap;
pub use field::{FieldMapping, FieldRole};
pub use registry::{MetadataRegistry, StaticRegistry};
