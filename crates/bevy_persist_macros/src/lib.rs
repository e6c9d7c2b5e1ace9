use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{
    format_ident,
    quote,
};
use syn::{
    Data,
    DeriveInput,
    Fields,
    Ident,
    LitStr,
    Path,
    parse_macro_input,
    spanned::Spanned,
};

fn bevy_persist_path() -> syn::Path {
    format_ident!("bevy_persist").into()
}

/// The role a field plays in the generated impl.
enum Role {
    Base,
    Origin,
    Children,
    Id,
}

#[derive(Default)]
struct Container {
    guid: Option<LitStr>,
    post_load: Option<Path>,
}

#[derive(Default)]
struct Roles {
    base: Option<Ident>,
    origin: Option<Ident>,
    children: Option<Ident>,
    id: Option<Ident>,
}

impl Roles {
    fn slot(&mut self, role: &Role) -> &mut Option<Ident> {
        match role {
            Role::Base => &mut self.base,
            Role::Origin => &mut self.origin,
            Role::Children => &mut self.children,
            Role::Id => &mut self.id,
        }
    }
}

fn parse_container(input: &DeriveInput) -> syn::Result<Container> {
    let mut container = Container::default();

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("reflected")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("guid") {
                container.guid = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("post_load") {
                let lit: LitStr = meta.value()?.parse()?;
                container.post_load = Some(lit.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `guid` or `post_load`"))
            }
        })?;
    }

    Ok(container)
}

fn parse_roles(input: &DeriveInput) -> syn::Result<Roles> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "`Reflected` can only be derived for structs",
        ));
    };

    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new(
            data.fields.span(),
            "`Reflected` requires named fields",
        ));
    };

    let mut roles = Roles::default();

    for field in &fields.named {
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("reflected")) {
            attr.parse_nested_meta(|meta| {
                let role = if meta.path.is_ident("base") {
                    Role::Base
                } else if meta.path.is_ident("origin") {
                    Role::Origin
                } else if meta.path.is_ident("children") {
                    Role::Children
                } else if meta.path.is_ident("id") {
                    Role::Id
                } else {
                    return Err(meta.error("expected `base`, `origin`, `children`, or `id`"));
                };

                let slot = roles.slot(&role);

                if slot.is_some() {
                    return Err(meta.error("role is already assigned to another field"));
                }

                *slot = field.ident.clone();
                Ok(())
            })?;
        }
    }

    if roles.base.is_some() && (roles.origin.is_some() || roles.children.is_some() || roles.id.is_some()) {
        return Err(syn::Error::new(
            input.span(),
            "a type with a `base` inherits `origin`, `children`, and `id` from it",
        ));
    }

    if roles.base.is_none() && roles.origin.is_none() {
        return Err(syn::Error::new(
            input.span(),
            "`Reflected` needs either a `#[reflected(base)]` or a `#[reflected(origin)]` field",
        ));
    }

    Ok(roles)
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let container = parse_container(input)?;
    let roles = parse_roles(input)?;

    let Some(guid) = container.guid else {
        return Err(syn::Error::new(
            input.span(),
            "missing `#[reflected(guid = \"...\")]`",
        ));
    };

    let krate = bevy_persist_path();
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (part, part_mut) = match &roles.base {
        Some(base) => (
            quote! { #krate::reflect::Reflected::part(&self.#base, guid) },
            quote! { #krate::reflect::Reflected::part_mut(&mut self.#base, guid) },
        ),
        None => (quote! { None }, quote! { None }),
    };

    let (origin, set_origin) = match (&roles.base, &roles.origin) {
        (Some(base), _) => (
            quote! { #krate::reflect::Reflected::origin(&self.#base) },
            quote! { #krate::reflect::Reflected::set_origin(&mut self.#base, origin) },
        ),
        (None, Some(field)) => (
            quote! { self.#field.as_ref() },
            quote! { self.#field = Some(origin) },
        ),
        (None, None) => unreachable!(),
    };

    let (children, children_mut, attach, detach) = match (&roles.base, &roles.children) {
        (Some(base), _) => (
            quote! { #krate::reflect::Reflected::children(&self.#base) },
            quote! { #krate::reflect::Reflected::children_mut(&mut self.#base) },
            quote! { #krate::reflect::Reflected::attach_child(&mut self.#base, child) },
            quote! { #krate::reflect::Reflected::detach_child(&mut self.#base, index) },
        ),
        (None, Some(field)) => (
            quote! { &self.#field },
            quote! { &mut self.#field },
            quote! {
                self.#field.push(child);
                Ok(())
            },
            quote! { (index < self.#field.len()).then(|| self.#field.remove(index)) },
        ),
        (None, None) => (quote! { &[] }, quote! { &mut [] }, quote! { Err(child) }, quote! {
            let _ = index;
            None
        }),
    };

    let (unique_id, set_unique_id) = match (&roles.base, &roles.id) {
        (Some(base), _) => (
            quote! { #krate::reflect::Reflected::unique_id(&self.#base) },
            quote! { #krate::reflect::Reflected::set_unique_id(&mut self.#base, id) },
        ),
        (None, Some(field)) => (
            quote! { self.#field.as_deref() },
            quote! { self.#field = Some(id) },
        ),
        (None, None) => (quote! { None }, quote! {
            let _ = id;
        }),
    };

    let base_post_load = roles.base.as_ref().map(|base| {
        quote! { #krate::reflect::Reflected::post_load(&mut self.#base)?; }
    });

    let own_post_load = container.post_load.map(|path| {
        quote! { #path(self)?; }
    });

    Ok(quote! {
        impl #impl_generics #krate::reflect::TypeGuid for #ident #ty_generics #where_clause {
            const GUID: &'static str = #guid;
        }

        impl #impl_generics #krate::reflect::Reflected for #ident #ty_generics #where_clause {
            fn type_guid(&self) -> &'static str {
                <Self as #krate::reflect::TypeGuid>::GUID
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }

            fn into_any(self: Box<Self>) -> Box<dyn ::core::any::Any> {
                self
            }

            fn part(&self, guid: &str) -> Option<&dyn ::core::any::Any> {
                if guid == <Self as #krate::reflect::TypeGuid>::GUID {
                    Some(self)
                } else {
                    #part
                }
            }

            fn part_mut(&mut self, guid: &str) -> Option<&mut dyn ::core::any::Any> {
                if guid == <Self as #krate::reflect::TypeGuid>::GUID {
                    Some(self)
                } else {
                    #part_mut
                }
            }

            fn origin(&self) -> Option<&#krate::reflect::Origin> {
                #origin
            }

            fn set_origin(&mut self, origin: #krate::reflect::Origin) {
                #set_origin
            }

            fn children(&self) -> &[Box<dyn #krate::reflect::Reflected>] {
                #children
            }

            fn children_mut(&mut self) -> &mut [Box<dyn #krate::reflect::Reflected>] {
                #children_mut
            }

            fn attach_child(
                &mut self,
                child: Box<dyn #krate::reflect::Reflected>,
            ) -> Result<(), Box<dyn #krate::reflect::Reflected>> {
                #attach
            }

            fn detach_child(&mut self, index: usize) -> Option<Box<dyn #krate::reflect::Reflected>> {
                #detach
            }

            fn unique_id(&self) -> Option<&str> {
                #unique_id
            }

            fn set_unique_id(&mut self, id: String) {
                #set_unique_id
            }

            fn post_load(&mut self) -> Result<(), #krate::Error> {
                #base_post_load
                #own_post_load
                Ok(())
            }
        }
    })
}

/// Derive macro generating impls of `Reflected` and `TypeGuid`.
///
/// Container attributes:
/// - `#[reflected(guid = "...")]` (required) the stable type identifier.
/// - `#[reflected(post_load = "path::to::fn")]` a `fn(&mut Self) -> Result<(), Error>`
///   run once the object and its children are fully loaded.
///
/// Field attributes:
/// - `#[reflected(base)]` the embedded parent type. Origin, children, and
///   identifier handling are delegated to it.
/// - `#[reflected(origin)]` an `Option<Origin>` slot (root types only).
/// - `#[reflected(children)]` a `Vec<Box<dyn Reflected>>` of owned children.
/// - `#[reflected(id)]` an `Option<String>` custom unique identifier.
///
/// This does not work for enums or unions.
#[proc_macro_derive(Reflected, attributes(reflected))]
pub fn derive_reflected(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
