//! Procedural macros for the docmap project.
//!
//! This crate provides `#[derive(Mapped)]`, which implements the `Mapped` trait from
//! the struct's fields so mapped classes don't need hand-written accessor tables.

#[allow(unused_extern_crates)]
extern crate self as docmap_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Fields, Ident, LitStr, Path, Type, parse_macro_input, spanned::Spanned,
};

/// Derives `docmap::Mapped` for a struct with named fields.
///
/// Container options, all optional:
///
/// - `class = "Name"` - class name, defaults to the struct name
/// - `collection = "name"` - collection name, defaults to the class name
/// - `validate = path` - a `fn(&Self) -> bool` consulted before inserts
/// - `derive_id = path` - a `fn(&Self) -> Option<Id>` choosing the id of new objects
///
/// Field options:
///
/// - `id` - marks the `Option<Id>` field holding the object id (required, exactly one)
/// - `embedded` - stores associated objects inline
/// - `indexed` - declares a store index on the attribute
/// - `rename = "name"` - persisted attribute name, defaults to the field name
/// - `skip` - leaves the field out of the persisted shape
///
/// ```ignore
/// #[derive(Debug, Default, Serialize, Deserialize, Mapped)]
/// #[mapped(collection = "books", validate = Book::has_title)]
/// pub struct Book {
///     #[mapped(id)]
///     pub id: Option<Id>,
///     #[mapped(indexed)]
///     pub title: String,
///     #[mapped(embedded)]
///     pub author: Association<Author>,
/// }
/// ```
#[proc_macro_derive(Mapped, attributes(mapped))]
pub fn derive_mapped(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct ContainerOptions {
    class: Option<LitStr>,
    collection: Option<LitStr>,
    validate: Option<Path>,
    derive_id: Option<Path>,
}

impl ContainerOptions {
    fn parse(input: &DeriveInput) -> syn::Result<Self> {
        let mut options = Self::default();

        for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("mapped")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("class") {
                    options.class = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("collection") {
                    options.collection = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("validate") {
                    options.validate = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("derive_id") {
                    options.derive_id = Some(meta.value()?.parse()?);
                } else {
                    return Err(meta.error("unsupported mapped container option"));
                }
                Ok(())
            })?;
        }

        Ok(options)
    }
}

#[derive(Default)]
struct FieldOptions {
    id: bool,
    embedded: bool,
    indexed: bool,
    skip: bool,
    rename: Option<LitStr>,
}

impl FieldOptions {
    fn parse(field: &syn::Field) -> syn::Result<Self> {
        let mut options = Self::default();

        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("mapped")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    options.id = true;
                } else if meta.path.is_ident("embedded") {
                    options.embedded = true;
                } else if meta.path.is_ident("indexed") {
                    options.indexed = true;
                } else if meta.path.is_ident("skip") {
                    options.skip = true;
                } else if meta.path.is_ident("rename") {
                    options.rename = Some(meta.value()?.parse()?);
                } else {
                    return Err(meta.error("unsupported mapped field option"));
                }
                Ok(())
            })?;
        }

        Ok(options)
    }
}

struct MappedField<'a> {
    ident: &'a Ident,
    ty: &'a Type,
    name: String,
    options: FieldOptions,
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let container = ContainerOptions::parse(&input)?;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "Mapped can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new(
            data.fields.span(),
            "Mapped requires named fields",
        ));
    };

    let mut id_field = None;
    let mut attributes = Vec::new();

    for field in &named.named {
        let options = FieldOptions::parse(field)?;
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };

        if options.id {
            if id_field.replace(ident).is_some() {
                return Err(syn::Error::new(ident.span(), "duplicate #[mapped(id)] field"));
            }
            continue;
        }
        if options.skip {
            continue;
        }

        let name = options
            .rename
            .as_ref()
            .map(LitStr::value)
            .unwrap_or_else(|| ident.to_string());

        attributes.push(MappedField {
            ident,
            ty: &field.ty,
            name,
            options,
        });
    }

    let Some(id_field) = id_field else {
        return Err(syn::Error::new(
            input.ident.span(),
            "Mapped requires a field marked #[mapped(id)]",
        ));
    };

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let class = container
        .class
        .map(|class| class.value())
        .unwrap_or_else(|| ident.to_string());
    let collection = match container.collection {
        Some(collection) => quote! {
            fn collection_name() -> &'static str {
                #collection
            }
        },
        None => quote! {},
    };

    let declarations = attributes.iter().map(|attribute| {
        let MappedField { ident, ty, name, options } = attribute;
        let embedded = options.embedded;
        let indexed = options.indexed;

        quote! {
            let definition = definition.attribute_with::<#ty>(
                #name,
                ::docmap::attribute::AttributeOptions { embedded: #embedded, indexed: #indexed },
                |object: &Self| &object.#ident,
                |object: &mut Self| &mut object.#ident,
            )?;
        }
    });

    let validate = container.validate.map(|validate| {
        quote! {
            let definition = definition.validate(|object: &Self| #validate(object));
        }
    });
    let derive_id = container.derive_id.map(|derive_id| {
        quote! {
            let definition = definition.id(|object: &Self| #derive_id(object));
        }
    });

    Ok(quote! {
        impl #impl_generics ::docmap::document::Mapped for #ident #ty_generics #where_clause {
            fn class_name() -> &'static str {
                #class
            }

            #collection

            fn id(&self) -> ::std::option::Option<&::docmap::id::Id> {
                self.#id_field.as_ref()
            }

            fn set_id(&mut self, id: ::docmap::id::Id) {
                self.#id_field = ::std::option::Option::Some(id);
            }

            fn define(
                definition: ::docmap::definition::DefinitionBuilder<Self>,
            ) -> ::docmap::error::MappingResult<::docmap::definition::DefinitionBuilder<Self>> {
                #(#declarations)*
                #validate
                #derive_id
                ::std::result::Result::Ok(definition)
            }
        }
    })
}
