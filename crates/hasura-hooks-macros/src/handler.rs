use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{FnArg, Ident, ItemFn, LitStr, parse_macro_input, spanned::Spanned};

#[derive(Default)]
struct EventArgs {
    trigger: Option<LitStr>,
    table: Option<LitStr>,
    schema: Option<LitStr>,
}

#[derive(Default)]
struct ActionArgs {
    name: Option<LitStr>,
}

/// Implementation of `#[event_handler(...)]`.
pub fn event_handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = EventArgs::default();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("trigger") {
            args.trigger = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("table") {
            args.table = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("schema") {
            args.schema = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error(
                "unsupported event_handler property, expected one of: trigger, table, schema",
            ));
        }
        Ok(())
    });
    parse_macro_input!(attr with parser);
    let func = parse_macro_input!(item as ItemFn);

    match expand_event_handler(args, func) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

/// Implementation of `#[action_handler(...)]`.
pub fn action_handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = ActionArgs::default();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("name") {
            args.name = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported action_handler property, expected `name`"))
        }
    });
    parse_macro_input!(attr with parser);
    let func = parse_macro_input!(item as ItemFn);

    match expand_action_handler(args, func) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

fn expand_event_handler(args: EventArgs, func: ItemFn) -> syn::Result<TokenStream2> {
    check_signature(&func, "event_handler")?;

    if args.trigger.is_none() && args.table.is_none() {
        return Err(syn::Error::new(
            Span::call_site(),
            "#[event_handler] requires `trigger = \"...\"` and/or `table = \"...\"`",
        ));
    }
    if let (Some(schema), None) = (&args.schema, &args.table) {
        return Err(syn::Error::new(
            schema.span(),
            "`schema` is only meaningful together with `table`",
        ));
    }

    let fn_name = &func.sig.ident;
    let method = fn_name.to_string();
    let static_name = registry_static("EVENT", fn_name);

    let trigger = match &args.trigger {
        Some(trigger) => quote!(::core::option::Option::Some(
            ::std::borrow::Cow::Borrowed(#trigger)
        )),
        None => quote!(::core::option::Option::None),
    };
    let table = match &args.table {
        Some(table) => {
            let schema = match &args.schema {
                Some(schema) => quote!(::core::option::Option::Some(#schema)),
                None => quote!(::core::option::Option::None),
            };
            quote!(::core::option::Option::Some(
                ::hasura_hooks::__private::TableRef::new(#schema, #table)
            ))
        }
        None => quote!(::core::option::Option::None),
    };

    Ok(quote! {
        #func

        #[::hasura_hooks::__private::linkme::distributed_slice(::hasura_hooks::__private::EVENT_HANDLERS)]
        #[linkme(crate = ::hasura_hooks::__private::linkme)]
        static #static_name: ::hasura_hooks::__private::EventHandlerEntry =
            ::hasura_hooks::__private::EventHandlerEntry {
                owner: ::core::module_path!(),
                method: #method,
                binding: ::hasura_hooks::__private::EventBindingConfig {
                    trigger_name: #trigger,
                    table: #table,
                },
                invoke: |event| ::hasura_hooks::__private::call_event_fn(#fn_name, event),
            };
    })
}

fn expand_action_handler(args: ActionArgs, func: ItemFn) -> syn::Result<TokenStream2> {
    check_signature(&func, "action_handler")?;

    let fn_name = &func.sig.ident;
    let method = fn_name.to_string();
    let name = match args.name {
        Some(name) if name.value().is_empty() => {
            return Err(syn::Error::new(name.span(), "action name must not be empty"));
        }
        Some(name) => name,
        None => LitStr::new(&method, fn_name.span()),
    };
    let static_name = registry_static("ACTION", fn_name);

    Ok(quote! {
        #func

        #[::hasura_hooks::__private::linkme::distributed_slice(::hasura_hooks::__private::ACTION_HANDLERS)]
        #[linkme(crate = ::hasura_hooks::__private::linkme)]
        static #static_name: ::hasura_hooks::__private::ActionHandlerEntry =
            ::hasura_hooks::__private::ActionHandlerEntry {
                owner: ::core::module_path!(),
                method: #method,
                name: #name,
                invoke: |input, action, headers| {
                    ::hasura_hooks::__private::call_action_fn(#fn_name, input, action, headers)
                },
            };
    })
}

/// Handlers must be free, non-generic `async fn`s.
fn check_signature(func: &ItemFn, macro_name: &str) -> syn::Result<()> {
    let sig = &func.sig;
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(
            sig.fn_token.span(),
            format!("#[{macro_name}] must be applied to an `async fn`"),
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            format!("#[{macro_name}] does not support generic functions"),
        ));
    }
    if let Some(FnArg::Receiver(receiver)) = sig.inputs.first() {
        return Err(syn::Error::new(
            receiver.span(),
            format!("#[{macro_name}] must be applied to a free function, not a method"),
        ));
    }
    Ok(())
}

fn registry_static(kind: &str, fn_name: &Ident) -> Ident {
    let upper = fn_name.to_string().to_uppercase();
    Ident::new(&format!("_HASURA_{kind}_HANDLER_{upper}"), Span::call_site())
}
