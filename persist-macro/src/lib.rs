use proc_macro::TokenStream;
use proc_macro2::{Ident, TokenStream as TokenStream2, TokenTree};
use quote::{ToTokens, quote};
use syn::{Data, DeriveInput, Fields, LitStr, Member, Type, parse_macro_input, parse_quote};

/// Derive `Persistable`, `PersistableType` and `Persist` for a struct.
///
/// Only fields marked `#[save]` are persisted; everything else is transient
/// and keeps its `Default` value on a freshly constructed instance. The
/// struct must implement `Default`.
///
/// # Attributes
///
/// - `#[persist(tag = "game::Door")]` on the struct overrides the type tag,
///   which defaults to the Rust type path
/// - `#[save]` persists a field through its `Persist` impl
/// - `#[save(polymorphic)]` marks a type-erased field as saved with its
///   runtime type
/// - `#[save(scalar)]` routes a field through serde as opaque plain data
/// - `#[save(rename = "name")]` persists a field under another member name
///
/// ```ignore
/// #[derive(Default, Persistable)]
/// #[persist(tag = "game::Inventory")]
/// struct Inventory {
///     #[save]
///     counts: BTreeMap<u32, String>,
///     #[save(polymorphic)]
///     equipped: Option<EntityHandle>,
///     #[save(scalar)]
///     color: [f32; 4],
///     scratch: Vec<u8>,
/// }
/// ```
#[proc_macro_derive(Persistable, attributes(save, persist))]
pub fn derive_persistable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct SavedField {
    member: Member,
    name: String,
    ty: Type,
    polymorphic: bool,
    scalar: bool,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let tag = struct_tag(input)?;
    let fields = saved_fields(input)?;

    let params: Vec<Ident> = input
        .generics
        .type_params()
        .map(|param| param.ident.clone())
        .collect();
    let mut generics = input.generics.clone();
    {
        let where_clause = generics.make_where_clause();
        // Bounds on concrete field types would make recursive types
        // (`Option<Shared<Self>>`) require their own impl to exist.
        for field in fields.iter().filter(|f| mentions_any(&f.ty, &params)) {
            let ty = &field.ty;
            if field.scalar {
                where_clause.predicates.push(parse_quote! {
                    #ty: redlilium_persist::serde::Serialize
                        + redlilium_persist::serde::de::DeserializeOwned
                });
            } else {
                where_clause
                    .predicates
                    .push(parse_quote! { #ty: redlilium_persist::Persist });
            }
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let tag_expr = match tag {
        Some(tag) => quote! { #tag },
        None => quote! { ::core::any::type_name::<Self>() },
    };

    let member_infos = fields.iter().map(member_info);

    let link_arms = fields.iter().map(|field| {
        let member = &field.member;
        let member_name = &field.name;
        if field.scalar {
            quote! {
                #member_name => ::core::result::Result::Err(redlilium_persist::LinkError::NotAReference)
            }
        } else {
            quote! {
                #member_name => redlilium_persist::Persist::link(&mut self.#member, target)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics redlilium_persist::Persistable for #name #ty_generics #where_clause {
            fn type_tag(&self) -> &'static str {
                <Self as redlilium_persist::PersistableType>::tag()
            }

            fn schema_builder(&self) -> fn() -> redlilium_persist::Schema {
                <Self as redlilium_persist::PersistableType>::build_schema
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }

            fn link_member(
                &mut self,
                member: &str,
                target: &redlilium_persist::ObjectHandle,
            ) -> ::core::result::Result<(), redlilium_persist::LinkError> {
                let _ = target;
                match member {
                    #(#link_arms,)*
                    _ => ::core::result::Result::Err(redlilium_persist::LinkError::UnknownMember {
                        member: ::std::string::ToString::to_string(member),
                        type_tag: <Self as redlilium_persist::PersistableType>::tag(),
                    }),
                }
            }
        }

        impl #impl_generics redlilium_persist::PersistableType for #name #ty_generics #where_clause {
            fn tag() -> &'static str {
                #tag_expr
            }

            fn build_schema() -> redlilium_persist::Schema {
                redlilium_persist::Schema::new(
                    <Self as redlilium_persist::PersistableType>::tag(),
                    ::core::any::type_name::<Self>(),
                    ::std::vec![#(#member_infos),*],
                )
            }
        }

        impl #impl_generics redlilium_persist::Persist for #name #ty_generics #where_clause {
            const KIND: redlilium_persist::MemberKind = redlilium_persist::MemberKind::Embedded;

            fn save(&self, ctx: &mut redlilium_persist::SaveContext<'_>) -> redlilium_persist::Value {
                ctx.save_value(self)
            }

            fn load(&mut self, value: redlilium_persist::Value, ctx: &mut redlilium_persist::LoadContext<'_>) -> bool {
                ctx.load_value(value, self)
            }

            fn load_new(
                value: redlilium_persist::Value,
                ctx: &mut redlilium_persist::LoadContext<'_>,
            ) -> ::core::option::Option<Self> {
                if value.is_null() {
                    return ::core::option::Option::None;
                }
                let mut fresh = <Self as ::core::default::Default>::default();
                ctx.load_value(value, &mut fresh).then_some(fresh)
            }
        }
    })
}

/// Schema entry for one saved field.
fn member_info(field: &SavedField) -> TokenStream2 {
    let member = &field.member;
    let name = &field.name;
    let ty = &field.ty;
    let flags = if field.polymorphic {
        quote! { redlilium_persist::MemberFlags::POLYMORPHIC }
    } else {
        quote! { redlilium_persist::MemberFlags::NONE }
    };

    let (constructor, save_body, load_body) = if field.scalar {
        (
            quote! { scalar },
            quote! { ctx.save_scalar(&this.#member) },
            quote! {
                if let ::core::option::Option::Some(decoded) = ctx.load_scalar::<#ty>(value) {
                    this.#member = decoded;
                }
            },
        )
    } else {
        (
            quote! { new },
            quote! { redlilium_persist::Persist::save(&this.#member, ctx) },
            quote! {
                redlilium_persist::Persist::load(&mut this.#member, value, ctx);
            },
        )
    };

    quote! {
        redlilium_persist::MemberInfo::#constructor::<#ty>(
            #name,
            #flags,
            |this: &dyn ::core::any::Any, ctx: &mut redlilium_persist::SaveContext<'_>| {
                match this.downcast_ref::<Self>() {
                    ::core::option::Option::Some(this) => #save_body,
                    ::core::option::Option::None => redlilium_persist::Value::Null,
                }
            },
            |this: &mut dyn ::core::any::Any,
             value: redlilium_persist::Value,
             ctx: &mut redlilium_persist::LoadContext<'_>| {
                if let ::core::option::Option::Some(this) = this.downcast_mut::<Self>() {
                    #load_body
                }
            },
        )
    }
}

/// Parse `#[persist(tag = "...")]` on the struct.
fn struct_tag(input: &DeriveInput) -> syn::Result<Option<LitStr>> {
    let mut tag = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("persist") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                tag = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("expected `tag = \"...\"`"))
            }
        })?;
    }
    Ok(tag)
}

/// Whether `ty` names one of the struct's type parameters anywhere.
fn mentions_any(ty: &Type, params: &[Ident]) -> bool {
    fn walk(tokens: TokenStream2, params: &[Ident]) -> bool {
        tokens.into_iter().any(|tree| match tree {
            TokenTree::Ident(ident) => params.contains(&ident),
            TokenTree::Group(group) => walk(group.stream(), params),
            _ => false,
        })
    }
    !params.is_empty() && walk(ty.to_token_stream(), params)
}

/// Collect the fields marked `#[save]`, in declaration order.
fn saved_fields(input: &DeriveInput) -> syn::Result<Vec<SavedField>> {
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Persistable can only be derived for structs",
            ));
        }
    };

    let mut saved = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("save")) else {
            continue;
        };
        let (member, default_name) = match (&field.ident, fields) {
            (Some(ident), Fields::Named(_)) => (Member::from(ident.clone()), ident.to_string()),
            _ => (Member::from(index), index.to_string()),
        };

        let mut name = default_name;
        let mut polymorphic = false;
        let mut scalar = false;
        if matches!(attr.meta, syn::Meta::List(_)) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("polymorphic") {
                    polymorphic = true;
                } else if meta.path.is_ident("scalar") {
                    scalar = true;
                } else if meta.path.is_ident("rename") {
                    name = meta.value()?.parse::<LitStr>()?.value();
                } else {
                    return Err(meta.error("expected `polymorphic`, `scalar` or `rename = \"...\"`"));
                }
                Ok(())
            })?;
        }
        if polymorphic && scalar {
            return Err(syn::Error::new_spanned(
                attr,
                "a scalar field cannot be polymorphic",
            ));
        }

        saved.push(SavedField {
            member,
            name,
            ty: field.ty.clone(),
            polymorphic,
            scalar,
        });
    }
    Ok(saved)
}
