//! Attribute descriptors and the ordered attribute set of a mapped class.
//!
//! The declaration order of attributes is the order used everywhere else: serialized documents
//! list their fields in it, [`Mapper::attributes`](crate::mapper::Mapper::attributes) returns
//! it, and index declaration walks it.

use indexmap::IndexMap;

use crate::{
    document::{ID_FIELD, METADATA_KEY},
    error::{MappingError, MappingResult},
    value::TypeTag,
};

/// Options of a mapped attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeOptions {
    /// Store associated objects inline instead of as references.
    pub embedded: bool,
    /// Declare a store index for this attribute.
    pub indexed: bool,
}

impl AttributeOptions {
    pub fn embedded() -> Self {
        Self { embedded: true, ..Self::default() }
    }

    pub fn indexed() -> Self {
        Self { indexed: true, ..Self::default() }
    }

    pub fn with_embedded(mut self, embedded: bool) -> Self {
        self.embedded = embedded;
        self
    }

    pub fn with_indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }
}

/// One mapped field of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    name: String,
    declared_type: Option<TypeTag>,
    options: AttributeOptions,
}

impl AttributeDescriptor {
    pub fn new(
        name: impl Into<String>,
        declared_type: Option<TypeTag>,
        options: AttributeOptions,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type,
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<&TypeTag> {
        self.declared_type.as_ref()
    }

    pub fn options(&self) -> AttributeOptions {
        self.options
    }

    pub fn is_embedded(&self) -> bool {
        self.options.embedded
    }

    pub fn is_indexed(&self) -> bool {
        self.options.indexed
    }
}

/// Ordered, name-unique collection of attribute descriptors.
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    class: &'static str,
    attributes: IndexMap<String, AttributeDescriptor>,
}

impl AttributeSet {
    pub fn new(class: &'static str) -> Self {
        Self {
            class,
            attributes: IndexMap::new(),
        }
    }

    /// Class the attributes belong to.
    pub fn class(&self) -> &'static str {
        self.class
    }

    /// Appends a descriptor.
    ///
    /// Fails with [`MappingError::DuplicateAttribute`] when the name is already present and
    /// with [`MappingError::InvalidAttribute`] when the name cannot be stored.
    pub fn add(&mut self, descriptor: AttributeDescriptor) -> MappingResult<()> {
        if !is_valid_name(descriptor.name()) {
            return Err(MappingError::InvalidAttribute {
                class: self.class,
                attribute: descriptor.name,
            });
        }

        if self.attributes.contains_key(descriptor.name()) {
            return Err(MappingError::DuplicateAttribute {
                class: self.class,
                attribute: descriptor.name,
            });
        }

        self.attributes.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Attribute names in declaration order. Calling it again starts over.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeDescriptor> + '_ {
        self.attributes.values()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a AttributeDescriptor;
    type IntoIter = indexmap::map::Values<'a, String, AttributeDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.values()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != ID_FIELD
        && name != METADATA_KEY
        && !name.contains('.')
        && !name.contains('$')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> AttributeDescriptor {
        AttributeDescriptor::new(name, Some(TypeTag::String), AttributeOptions::default())
    }

    #[test]
    fn names_follow_declaration_order() {
        let mut set = AttributeSet::new("Book");
        for name in ["title", "authors", "price"] {
            set.add(descriptor(name)).unwrap();
        }

        assert_eq!(set.names().collect::<Vec<_>>(), ["title", "authors", "price"]);
        // restartable
        assert_eq!(set.names().count(), 3);
    }

    #[test]
    fn lookup_by_name() {
        let mut set = AttributeSet::new("Book");
        set.add(AttributeDescriptor::new(
            "author",
            None,
            AttributeOptions::embedded(),
        ))
        .unwrap();

        assert!(set.get("author").unwrap().is_embedded());
        assert!(set.get("title").is_none());
        assert!(set.contains("author"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut set = AttributeSet::new("Book");
        set.add(descriptor("title")).unwrap();

        let error = set.add(descriptor("title")).unwrap_err();
        assert!(matches!(
            error,
            MappingError::DuplicateAttribute { class: "Book", ref attribute } if attribute == "title"
        ));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn reserved_and_malformed_names_are_rejected() {
        let mut set = AttributeSet::new("Book");
        for name in ["", "id", "__metadata__", "a.b", "$where"] {
            assert!(matches!(
                set.add(descriptor(name)),
                Err(MappingError::InvalidAttribute { .. })
            ));
        }
        assert!(set.is_empty());
    }
}
