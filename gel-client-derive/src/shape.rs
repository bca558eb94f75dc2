use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;

use crate::attrib::{ContainerAttrs, FieldAttrs};

struct Field {
    ident: syn::Ident,
    ty: syn::Type,
    wire_name: String,
    json: bool,
}

pub fn derive_struct(item: &syn::ItemStruct) -> syn::Result<TokenStream> {
    let container = ContainerAttrs::from_syn(&item.attrs)?;
    let proto = container.protocol_path();
    let name = &item.ident;

    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "generic structs cannot derive Queryable",
        ));
    }
    let named = match &item.fields {
        syn::Fields::Named(named) => named,
        _ => {
            return Err(syn::Error::new_spanned(
                &item.ident,
                "only structs with named fields can derive Queryable",
            ))
        }
    };

    let mut fields = Vec::with_capacity(named.named.len());
    for field in &named.named {
        let attrs = FieldAttrs::from_syn(&field.attrs)?;
        let ident = field.ident.clone().expect("named field");
        let wire_name = match attrs.rename {
            Some(lit) => lit.value(),
            None => ident.unraw().to_string(),
        };
        fields.push(Field {
            ident,
            ty: field.ty.clone(),
            wire_name,
            json: attrs.json,
        });
    }

    let args_types = fields.iter().map(|f| {
        let ty = &f.ty;
        if f.json {
            quote!(())
        } else {
            quote!(<#ty as #proto::queryable::Queryable>::Args)
        }
    });

    let checks = fields.iter().map(|f| {
        let ty = &f.ty;
        let wire_name = &f.wire_name;
        let body = if f.json {
            quote! {
                #proto::queryable::check_scalar(
                    ctx, element.1, #proto::codec::STD_JSON, "std::json")?;
                if !element.2 {
                    return Err(#proto::queryable::DescriptorMismatch::NotOptional {
                        field: #wire_name.into(),
                    });
                }
            }
        } else {
            quote! {
                let child = <#ty as #proto::queryable::Queryable>
                    ::check_descriptor(ctx, element.1)?;
                if !element.2
                    && !<#ty as #proto::queryable::Queryable>::accepts_missing()
                {
                    return Err(#proto::queryable::DescriptorMismatch::NotOptional {
                        field: #wire_name.into(),
                    });
                }
                child
            }
        };
        quote! {
            {
                let element = loop {
                    match __element_iter.next() {
                        Some(el) if el.3 => __skip.push(true),
                        Some(el) => break el,
                        None => return Err(
                            ctx.expected(format!("field `{}`", #wire_name))),
                    }
                };
                if element.0 != #wire_name {
                    return Err(#proto::queryable::DescriptorMismatch::WrongField {
                        unexpected: element.0.into(),
                        expected: #wire_name.into(),
                    });
                }
                __skip.push(false);
                #body
            }
        }
    });

    let decodes = fields.iter().enumerate().map(|(idx, f)| {
        let local = format_ident!("__field_{idx}");
        let ty = &f.ty;
        let idx = syn::Index::from(idx);
        let value = if f.json {
            quote! {
                match #proto::queryable::next_shape_element(buf, &mut __off)? {
                    Some(data) => #proto::queryable::decode_json(data)?,
                    None => return Err(#proto::errors::MissingRequiredElement.build()),
                }
            }
        } else {
            quote! {
                match #proto::queryable::next_shape_element(buf, &mut __off)? {
                    Some(data) => <#ty as #proto::queryable::Queryable>
                        ::decode(decoder, &args.fields.#idx, data)?,
                    None => <#ty as #proto::queryable::Queryable>
                        ::decode_missing(decoder, &args.fields.#idx)?,
                }
            }
        };
        quote! {
            while *args.skip.get(__element_pos).unwrap_or(&false) {
                let _ = #proto::queryable::next_shape_element(buf, &mut __off)?;
                __element_pos += 1;
            }
            __element_pos += 1;
            let #local = #value;
        }
    });

    let field_inits = fields.iter().enumerate().map(|(idx, f)| {
        let ident = &f.ident;
        let local = format_ident!("__field_{idx}");
        quote!(#ident: #local)
    });

    Ok(quote! {
        const _: () = {
            pub struct DerivedArgs {
                skip: ::std::vec::Vec<bool>,
                fields: (#(#args_types,)*),
            }

            impl #proto::queryable::Queryable for #name {
                type Args = DerivedArgs;

                fn check_descriptor(
                    ctx: &#proto::queryable::DescriptorContext,
                    type_pos: #proto::descriptors::TypePos,
                ) -> ::std::result::Result<
                    Self::Args, #proto::queryable::DescriptorMismatch>
                {
                    use #proto::descriptors::Descriptor;

                    let desc = ctx.get(type_pos)?;
                    let __elements: ::std::vec::Vec<
                        (&str, #proto::descriptors::TypePos, bool, bool)
                    > = match desc {
                        Descriptor::ObjectShape(d) => d.elements.iter()
                            .map(|e| (&e.name[..], e.type_pos, e.required(),
                                      e.flag_implicit))
                            .collect(),
                        Descriptor::NamedTuple(d) => d.elements.iter()
                            .map(|e| (&e.name[..], e.type_pos, true, false))
                            .collect(),
                        Descriptor::SQLRecord(d) => d.elements.iter()
                            .map(|e| (&e.name[..], e.type_pos, true, false))
                            .collect(),
                        _ => return Err(ctx.wrong_type(desc, "object")),
                    };
                    let mut __skip =
                        ::std::vec::Vec::with_capacity(__elements.len());
                    let mut __element_iter = __elements.iter();
                    let fields = (#(#checks,)*);
                    for el in __element_iter {
                        if el.3 {
                            __skip.push(true);
                        } else {
                            return Err(ctx.expected(
                                format!("no field `{}` in the target", el.0)));
                        }
                    }
                    Ok(DerivedArgs { skip: __skip, fields })
                }

                fn decode(
                    decoder: &#proto::queryable::Decoder,
                    args: &Self::Args,
                    buf: &[u8],
                ) -> ::std::result::Result<Self, #proto::errors::DecodeError> {
                    let mut __off = #proto::queryable::decode_shape_header(
                        buf, args.skip.len())?;
                    let mut __element_pos = 0usize;
                    #(#decodes)*
                    while __element_pos < args.skip.len() {
                        let _ = #proto::queryable::next_shape_element(buf, &mut __off)?;
                        __element_pos += 1;
                    }
                    #proto::queryable::finish_shape(buf, __off)?;
                    Ok(#name { #(#field_inits,)* })
                }
            }
        };
    })
}
