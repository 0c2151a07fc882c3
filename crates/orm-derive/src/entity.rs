//! Entity derive implementation

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::quote;
use syn::{
    parse::Result, parse_macro_input, Data, DeriveInput, Error, Fields, GenericArgument, PathArguments, Type,
};

pub fn derive_entity_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(result) => result.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// One named field of the struct
struct EntityField {
    ident: Ident,
    /// Field name without the `r#` prefix
    name: String,
    /// `T` for `Option<T>` fields, the field type otherwise
    value_type: Type,
    nullable: bool,
    mutable: bool,
}

fn expand(input: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "#[derive(Entity)] does not support generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named
                .named
                .iter()
                .map(parse_field)
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(Error::new_spanned(
                    &input.ident,
                    "#[derive(Entity)] requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new_spanned(
                &input.ident,
                "#[derive(Entity)] can only be applied to structs",
            ))
        }
    };

    let entity_impl = generate_entity_impl(input, &fields);
    let field_consts = generate_field_consts(input, &fields);

    Ok(quote! {
        #entity_impl

        #field_consts
    })
}

fn parse_field(field: &syn::Field) -> Result<EntityField> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected a named field"))?;

    let mut mutable = false;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("mutable") {
                mutable = true;
                Ok(())
            } else {
                Err(meta.error("unknown entity attribute, expected `mutable`"))
            }
        })?;
    }

    let (value_type, nullable) = match option_inner(&field.ty) {
        Some(inner) => (inner.clone(), true),
        None => (field.ty.clone(), false),
    };

    let name = ident.to_string();
    let name = name.strip_prefix("r#").unwrap_or(&name).to_string();

    Ok(EntityField {
        ident,
        name,
        value_type,
        nullable,
        mutable,
    })
}

/// `T` of `Option<T>`
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else { return None };
    if type_path.qself.is_some() {
        return None;
    }
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

fn generate_entity_impl(input: &DeriveInput, fields: &[EntityField]) -> proc_macro2::TokenStream {
    let struct_name = &input.ident;
    let entity_name = struct_name.to_string();

    let field_infos = fields.iter().map(|f| {
        let name = &f.name;
        let value_type = &f.value_type;
        let nullable = f.nullable;
        let mutable = f.mutable;
        quote! {
            ::tabula_orm::schema::FieldInfo::new::<#value_type>(#name, #nullable, #mutable)
        }
    });

    let getters = fields.iter().map(|f| {
        let name = &f.name;
        let ident = &f.ident;
        if f.nullable {
            quote! { #name => ::std::option::Option::Some(::tabula_orm::schema::FieldRef::from_option(self.#ident.as_ref())) }
        } else {
            quote! { #name => ::std::option::Option::Some(::tabula_orm::schema::FieldRef::Value(&self.#ident)) }
        }
    });

    let setters = fields.iter().map(|f| {
        let name = &f.name;
        let ident = &f.ident;
        let value_type = &f.value_type;
        match (f.mutable, f.nullable) {
            (false, _) => quote! {
                #name => ::std::result::Result::Err(::tabula_orm::schema::immutable_field(#entity_name, name))
            },
            (true, true) => quote! {
                #name => {
                    self.#ident = ::tabula_orm::schema::FieldValues::optional::<#value_type>(#entity_name, #name, value)?;
                    ::std::result::Result::Ok(())
                }
            },
            (true, false) => quote! {
                #name => {
                    self.#ident = ::tabula_orm::schema::FieldValues::required::<#value_type>(#entity_name, #name, value)?;
                    ::std::result::Result::Ok(())
                }
            },
        }
    });

    let initializers = fields.iter().map(|f| {
        let name = &f.name;
        let ident = &f.ident;
        let value_type = &f.value_type;
        if f.nullable {
            quote! { #ident: values.take_optional::<#value_type>(#name)? }
        } else {
            quote! { #ident: values.take::<#value_type>(#name)? }
        }
    });

    quote! {
        impl ::tabula_orm::schema::Entity for #struct_name {
            fn descriptor() -> ::tabula_orm::schema::EntityDescriptor {
                ::tabula_orm::schema::EntityDescriptor::new::<Self>(
                    #entity_name,
                    ::std::vec![#(#field_infos),*],
                )
            }

            fn field(&self, name: &str) -> ::std::option::Option<::tabula_orm::schema::FieldRef<'_>> {
                match name {
                    #(#getters,)*
                    _ => ::std::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn set_field(
                &mut self,
                name: &str,
                value: ::tabula_orm::schema::FieldValue,
            ) -> ::tabula_orm::OrmResult<()> {
                match name {
                    #(#setters,)*
                    _ => ::std::result::Result::Err(::tabula_orm::MappingError::UnknownField {
                        entity: #entity_name,
                        field: name.to_string(),
                    }
                    .into()),
                }
            }

            #[allow(unused_mut)]
            fn construct(
                mut values: ::tabula_orm::schema::FieldValues,
            ) -> ::tabula_orm::OrmResult<Self> {
                ::std::result::Result::Ok(Self {
                    #(#initializers),*
                })
            }
        }
    }
}

fn generate_field_consts(input: &DeriveInput, fields: &[EntityField]) -> proc_macro2::TokenStream {
    let struct_name = &input.ident;
    let vis = &input.vis;

    let consts = fields.iter().map(|f| {
        let const_name = Ident::new(&f.name.to_uppercase(), Span::call_site());
        let name = &f.name;
        let value_type = &f.value_type;
        let doc = format!("Field `{}` of `{}`", name, struct_name);
        quote! {
            #[doc = #doc]
            #[allow(dead_code)]
            #vis const #const_name: ::tabula_orm::schema::Field<#struct_name, #value_type> =
                ::tabula_orm::schema::Field::new(#name);
        }
    });

    quote! {
        #[allow(non_upper_case_globals)]
        impl #struct_name {
            #(#consts)*
        }
    }
}
