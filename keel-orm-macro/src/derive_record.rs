//! Expansion of `#[derive(Record)]`.
//!
//! For a struct `S` with fields `f0..fn` this generates:
//!
//! - `descriptor()` - name, optional table, one `FieldDescriptor` per field, hook flags
//! - `to_values()` - one `Value` per field in declaration order (`Null` for ignored fields)
//! - `from_values()` - the inverse, using `Default` for ignored fields
//! - `set_value()` - assignment of a single field by logical name
//! - `as_*()` hook accessors for the hooks listed in `#[orm(hooks(...))]`

use heck::ToUpperCamelCase;
use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type, ext::IdentExt};

const HOOKS: &[&str] =
    &["before_create", "after_create", "before_update", "after_update", "before_delete", "after_delete", "after_find"];

struct RecordField<'a> {
    ident: &'a Ident,
    name: String,
    ty: &'a Type,
    tag: String,
    ignored: bool,
}

#[derive(Default)]
struct RecordAttrs {
    table: Option<LitStr>,
    hooks: Vec<Ident>,
}

pub fn expand(ast: DeriveInput) -> syn::Result<TokenStream> {
    let struct_name = &ast.ident;
    let record_name = struct_name.unraw().to_string();

    let named = match &ast.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => return Err(syn::Error::new_spanned(struct_name, "Record must have named fields")),
        },
        _ => return Err(syn::Error::new_spanned(struct_name, "Record must be a struct")),
    };

    let attrs = record_attrs(&ast)?;
    let fields = named
        .iter()
        .map(|f| {
            let ident = f.ident.as_ref().ok_or_else(|| syn::Error::new_spanned(f, "unnamed field"))?;
            let tag = field_tag(f)?;
            Ok(RecordField { ident, name: ident.unraw().to_string(), ty: &f.ty, ignored: tag.trim() == "-", tag })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    // ------------------------------------------------------------------------
    // descriptor()
    // ------------------------------------------------------------------------
    let descriptors = fields.iter().map(|f| {
        let RecordField { name, ty, tag, .. } = f;
        if f.ignored {
            quote! {
                keel_orm::FieldDescriptor {
                    name: #name,
                    kind: keel_orm::ValueKind::Other(stringify!(#ty)),
                    optional: false,
                    tag: #tag,
                }
            }
        } else {
            quote! {
                keel_orm::FieldDescriptor {
                    name: #name,
                    kind: <#ty as keel_orm::ColumnValue>::KIND,
                    optional: <#ty as keel_orm::ColumnValue>::NULLABLE,
                    tag: #tag,
                }
            }
        }
    });

    let table = match &attrs.table {
        Some(table) => quote! { Some(#table) },
        None => quote! { None },
    };
    let hook_flags = attrs.hooks.iter().map(|hook| quote! { #hook: true, });

    // ------------------------------------------------------------------------
    // to_values() / from_values() / set_value()
    // ------------------------------------------------------------------------
    let to_values = fields.iter().map(|f| {
        let ident = f.ident;
        let ty = f.ty;
        if f.ignored {
            quote! { keel_orm::Value::Null }
        } else {
            quote! { <#ty as keel_orm::ColumnValue>::to_value(&self.#ident) }
        }
    });

    let decoded = fields.iter().map(|f| {
        let ident = f.ident;
        let name = &f.name;
        if f.ignored {
            quote! { #ident: { values.next(); ::core::default::Default::default() } }
        } else {
            quote! { #ident: keel_orm::decode_field(values.next(), #record_name, #name)? }
        }
    });

    let setters = fields.iter().filter(|f| !f.ignored).map(|f| {
        let ident = f.ident;
        let name = &f.name;
        quote! {
            #name => {
                self.#ident = keel_orm::decode_field(Some(value), #record_name, #name)?;
                Ok(())
            }
        }
    });

    // ------------------------------------------------------------------------
    // Hook accessors
    // ------------------------------------------------------------------------
    let accessors = attrs.hooks.iter().map(|hook| {
        let accessor = format_ident!("as_{}", hook);
        let capability = Ident::new(&hook.to_string().to_upper_camel_case(), Span::call_site());
        quote! {
            fn #accessor(&mut self) -> Option<&mut dyn keel_orm::#capability> {
                Some(self)
            }
        }
    });

    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics keel_orm::Record for #struct_name #ty_generics #where_clause {
            fn descriptor() -> keel_orm::RecordDescriptor {
                keel_orm::RecordDescriptor {
                    name: #record_name,
                    table: #table,
                    fields: vec![#(#descriptors),*],
                    hooks: keel_orm::HookFlags {
                        #(#hook_flags)*
                        ..::core::default::Default::default()
                    },
                }
            }

            fn to_values(&self) -> Vec<keel_orm::Value> {
                vec![#(#to_values),*]
            }

            fn from_values(values: Vec<keel_orm::Value>) -> Result<Self, keel_orm::Error> {
                let mut values = values.into_iter();
                Ok(Self { #(#decoded),* })
            }

            fn set_value(&mut self, field: &str, value: keel_orm::Value) -> Result<(), keel_orm::Error> {
                match field {
                    #(#setters)*
                    _ => Err(keel_orm::Error::UnknownColumn {
                        record: #record_name.to_string(),
                        column: field.to_string(),
                    }),
                }
            }

            #(#accessors)*
        }
    })
}

/// Reads `#[orm(table = "...", hooks(...))]` on the struct.
fn record_attrs(ast: &DeriveInput) -> syn::Result<RecordAttrs> {
    let mut attrs = RecordAttrs::default();
    for attr in ast.attrs.iter().filter(|a| a.path().is_ident("orm")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                attrs.table = Some(meta.value()?.parse()?);
                return Ok(());
            }
            if meta.path.is_ident("hooks") {
                return meta.parse_nested_meta(|hook| {
                    let ident = hook.path.get_ident().ok_or_else(|| hook.error("expected a hook name"))?;
                    if !HOOKS.contains(&ident.to_string().as_str()) {
                        return Err(hook.error(format!("unknown hook, expected one of: {}", HOOKS.join(", "))));
                    }
                    if !attrs.hooks.contains(ident) {
                        attrs.hooks.push(ident.clone());
                    }
                    Ok(())
                });
            }
            Err(meta.error("expected `table = \"...\"` or `hooks(...)`"))
        })?;
    }
    Ok(attrs)
}

/// Joins every `#[orm("...")]` string on a field with `;`.
fn field_tag(field: &syn::Field) -> syn::Result<String> {
    let mut parts = Vec::new();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("orm")) {
        let tag: LitStr = attr.parse_args()?;
        parts.push(tag.value());
    }
    Ok(parts.join(";"))
}
