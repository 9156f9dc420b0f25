//! Mapped-class definitions.
//!
//! A [`DefinitionBuilder`] collects the attributes of a class together with the functions that
//! read and write them (the injection table), an optional id rule and an optional validator.
//! [`DefinitionBuilder::build`] freezes it into a [`MapperDefinition`], which never changes
//! afterwards.
//!
//! # Example
//!
//! ```ignore
//! let definition = DefinitionBuilder::<Book>::new()
//!     .attribute("title", |b: &Book| &b.title, |b: &mut Book| &mut b.title)?
//!     .attribute_with("author", AttributeOptions::embedded(), |b: &Book| &b.author, |b: &mut Book| &mut b.author)?
//!     .id(|book| Some(Id::from(slugify(&book.title))))
//!     .validate(|book: &Book| !book.title.is_empty())
//!     .build();
//! ```

use std::{collections::HashMap, fmt};

use crate::{
    attribute::{AttributeDescriptor, AttributeOptions, AttributeSet},
    document::Mapped,
    error::MappingResult,
    id::Id,
    value::{FieldType, Value},
};

type Reader<T> = Box<dyn Fn(&T) -> MappingResult<Value> + Send + Sync>;
type Writer<T> = Box<dyn Fn(&mut T, Value) -> MappingResult<()> + Send + Sync>;
type IdRule<T> = Box<dyn Fn(&T) -> Option<Id> + Send + Sync>;

/// Reads and writes one attribute of a `T`.
pub struct Accessor<T> {
    read: Reader<T>,
    write: Writer<T>,
}

impl<T> Accessor<T> {
    pub fn read(&self, object: &T) -> MappingResult<Value> {
        (self.read)(object)
    }

    pub fn write(&self, object: &mut T, value: Value) -> MappingResult<()> {
        (self.write)(object, value)
    }
}

/// Yes/no gate consulted before an object is inserted.
pub trait Validator<T>: Send + Sync {
    fn valid(&self, object: &T) -> bool;
}

impl<T, F> Validator<T> for F
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn valid(&self, object: &T) -> bool {
        self(object)
    }
}

/// Builder for a [`MapperDefinition`].
pub struct DefinitionBuilder<T> {
    class: &'static str,
    collection: &'static str,
    attributes: AttributeSet,
    accessors: HashMap<String, Accessor<T>>,
    id_rule: Option<IdRule<T>>,
    validator: Option<Box<dyn Validator<T>>>,
}

impl<T: Mapped> DefinitionBuilder<T> {
    pub fn new() -> Self {
        Self {
            class: T::class_name(),
            collection: T::collection_name(),
            attributes: AttributeSet::new(T::class_name()),
            accessors: HashMap::new(),
            id_rule: None,
            validator: None,
        }
    }

    /// Overrides the collection name.
    pub fn collection(mut self, collection: &'static str) -> Self {
        self.collection = collection;
        self
    }

    /// Declares an attribute with default options.
    pub fn attribute<F: FieldType>(
        self,
        name: impl Into<String>,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> MappingResult<Self> {
        self.attribute_with(name, AttributeOptions::default(), get, get_mut)
    }

    /// Declares an embedded attribute.
    pub fn embedded<F: FieldType>(
        self,
        name: impl Into<String>,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> MappingResult<Self> {
        self.attribute_with(name, AttributeOptions::embedded(), get, get_mut)
    }

    /// Declares an attribute with explicit options.
    pub fn attribute_with<F: FieldType>(
        mut self,
        name: impl Into<String>,
        options: AttributeOptions,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> MappingResult<Self> {
        let name = name.into();
        self.attributes
            .add(AttributeDescriptor::new(name.clone(), F::type_tag(), options))?;

        let accessor = Accessor {
            read: Box::new(move |object: &T| get(object).to_value()),
            write: Box::new(move |object: &mut T, value: Value| {
                *get_mut(object) = F::from_value(value)?;
                Ok(())
            }),
        };
        self.accessors.insert(name, accessor);

        Ok(self)
    }

    /// Sets the rule deriving the id of new objects. Returning `None` lets the store choose.
    pub fn id<R>(mut self, rule: R) -> Self
    where
        R: Fn(&T) -> Option<Id> + Send + Sync + 'static,
    {
        self.id_rule = Some(Box::new(rule));
        self
    }

    /// Sets the validator consulted before inserts.
    pub fn validate<V>(mut self, validator: V) -> Self
    where
        V: Validator<T> + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn build(self) -> MapperDefinition<T> {
        MapperDefinition {
            class: self.class,
            collection: self.collection,
            attributes: self.attributes,
            accessors: self.accessors,
            id_rule: self.id_rule,
            validator: self.validator,
        }
    }
}

impl<T: Mapped> Default for DefinitionBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The immutable mapping definition of a class.
pub struct MapperDefinition<T> {
    class: &'static str,
    collection: &'static str,
    attributes: AttributeSet,
    accessors: HashMap<String, Accessor<T>>,
    id_rule: Option<IdRule<T>>,
    validator: Option<Box<dyn Validator<T>>>,
}

impl<T> MapperDefinition<T> {
    pub fn class(&self) -> &'static str {
        self.class
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn accessor(&self, name: &str) -> Option<&Accessor<T>> {
        self.accessors.get(name)
    }

    /// Id the rule derives for a new object, if any.
    pub fn derive_id(&self, object: &T) -> Option<Id> {
        self.id_rule.as_ref().and_then(|rule| rule(object))
    }

    /// Runs the validator. Objects of classes without a validator are always valid.
    pub fn is_valid(&self, object: &T) -> bool {
        self.validator
            .as_ref()
            .map_or(true, |validator| validator.valid(object))
    }
}

impl<T> fmt::Debug for MapperDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperDefinition")
            .field("class", &self.class)
            .field("collection", &self.collection)
            .field("attributes", &self.attributes)
            .field("id_rule", &self.id_rule.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}
