use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, LitStr};

pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "Message derive only supports structs with named fields",
                )
                .to_compile_error()
                .into()
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "Message derive only supports structs")
                .to_compile_error()
                .into()
        }
    };

    let (type_name, unique_key) = match parse_struct_attrs(&input) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };

    let envelope_field = match extract_envelope_field(fields) {
        Ok(field) => field,
        Err(err) => return err.to_compile_error().into(),
    };
    if !fields
        .iter()
        .any(|f| f.ident.as_ref() == Some(&envelope_field))
    {
        return syn::Error::new_spanned(
            name,
            "Message derive requires an `envelope` field or a field marked #[message(envelope)]",
        )
        .to_compile_error()
        .into();
    }

    let unique_key_fn = unique_key.map(|field| {
        quote! {
            fn unique_key(&self) -> String {
                self.#field.to_string()
            }
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics sourced_bus::Message for #name #ty_generics #where_clause {
            fn type_name() -> &'static str
            where
                Self: Sized,
            {
                #type_name
            }

            fn message_type(&self) -> &'static str {
                #type_name
            }

            fn envelope(&self) -> &sourced_bus::Envelope {
                &self.#envelope_field
            }

            fn envelope_mut(&mut self) -> &mut sourced_bus::Envelope {
                &mut self.#envelope_field
            }

            #unique_key_fn

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    };

    TokenStream::from(expanded)
}

fn parse_struct_attrs(input: &DeriveInput) -> syn::Result<(String, Option<syn::Ident>)> {
    let mut type_name = input.ident.to_string();
    let mut unique_key = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("message") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                type_name = value.value();
                Ok(())
            } else if meta.path.is_ident("unique_key") {
                unique_key = Some(meta.value()?.parse::<syn::Ident>()?);
                Ok(())
            } else {
                Err(meta.error("expected `name` or `unique_key`"))
            }
        })?;
    }

    if type_name.trim().is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "message name must not be empty",
        ));
    }

    Ok((type_name, unique_key))
}

fn extract_envelope_field(
    fields: &syn::punctuated::Punctuated<syn::Field, syn::Token![,]>,
) -> syn::Result<syn::Ident> {
    for field in fields {
        for attr in &field.attrs {
            if !attr.path().is_ident("message") {
                continue;
            }
            let mut is_envelope = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("envelope") {
                    is_envelope = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `envelope`"))
                }
            })?;
            if is_envelope {
                if let Some(ident) = &field.ident {
                    return Ok(ident.clone());
                }
            }
        }
    }

    Ok(format_ident!("envelope"))
}
