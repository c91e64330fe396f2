use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject
/// dependencies.
///
/// Every test gets a fresh [`crate::store::MemoryStore`] seeded with one
/// running election and two voters who have not voted. Injectable
/// dependencies are [`rocket::local::asynchronous::Client`] (a server backed
/// by that store), the `MemoryStore` itself, and the seeded `Ballot`.
///
/// Pass `voter` as the argument (`#[backend_test(voter)]`) to log the client
/// in as the first example voter before the test starts.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in the client as a voter if needed.
    let maybe_login = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "voter" => quote! {{
            let response = rocket_client
                .post(uri!(crate::api::voter::login))
                .header(rocket::http::ContentType::JSON)
                .body(
                    rocket::serde::json::json!({
                        "student_id": crate::model::voter::StudentId::example(),
                    })
                    .to_string(),
                )
                .dispatch()
                .await;
            assert_eq!(response.status(), rocket::http::Status::Ok);
        }},
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `voter`")
                .into_compile_error()
                .into();
        }
        None => TokenStream2::new(),
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::store::MemoryStore,
                crate::model::candidate::Ballot,
            ) {
                let (store, ballot) = crate::store::MemoryStore::example().await;
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_store(std::sync::Arc::new(store.clone())),
                )
                .await
                .unwrap();

                #maybe_login

                (rocket_client, store, ballot)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, store, ballot) = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Run an asynchronous test against a real MongoDB server, and ensure that
/// its database is dropped regardless of how the test terminates.
///
/// The only injectable dependency is [`crate::store::MongoStore`], backed by
/// a fresh database on the server configured by `db_uri`. These tests are
/// ignored by default; run them with `cargo test -- --ignored`.
#[proc_macro_attribute]
pub fn db_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    if let Err(err) = check_db_sig(&item_fn.sig) {
        return err.into_compile_error().into();
    }

    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    quote! {
        #[test]
        #[ignore = "needs a MongoDB server"]
        fn #name() {
            /// The test itself.
            #item_fn

            // Separate runtimes for inside and outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("db-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            let db = outer_runtime.block_on(crate::config::test_database());

            // Use mutexes to safely transfer `!UnwindSafe` data.
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();
                let store = crate::store::MongoStore::from_db(&db);
                runtime.block_on(#new_name(store));
            });

            outer_runtime.block_on(async { db.drop(None).await.unwrap() });

            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Ensure a database test is async and takes exactly one `MongoStore`.
fn check_db_sig(sig: &Signature) -> Result<(), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }
    let mut inputs = sig.inputs.iter();
    match (inputs.next(), inputs.next()) {
        (Some(FnArg::Typed(pat_type)), None) => {
            if let Type::Path(type_path) = &*pat_type.ty {
                if let Some(segment) = type_path.path.segments.last() {
                    if segment.ident == "MongoStore" {
                        return Ok(());
                    }
                }
            }
            Err(syn::Error::new(pat_type.span(), "Expected `store_ident: MongoStore`"))
        }
        _ => Err(syn::Error::new(
            sig.inputs.span(),
            "Test must accept exactly one `MongoStore`",
        )),
    }
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut args = vec![];
    let mut seen: Vec<String> = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(type_ident) = type_path.path.segments.last().map(|s| &s.ident) {
                    let injected = if type_ident == "Client" {
                        Some(quote! { rocket_client })
                    } else if type_ident == "MemoryStore" {
                        Some(quote! { store.clone() })
                    } else if type_ident == "Ballot" {
                        Some(quote! { ballot.clone() })
                    } else {
                        None
                    };
                    if let Some(arg) = injected {
                        let type_name = type_ident.to_string();
                        if seen.contains(&type_name) {
                            return Err(syn::Error::new(
                                input.span(),
                                format!("Test cannot accept more than one `{type_name}`"),
                            ));
                        }
                        seen.push(type_name);
                        args.push(arg);
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `store_ident: MemoryStore` or `ballot_ident: Ballot`",
        ));
    }

    Ok(args)
}
