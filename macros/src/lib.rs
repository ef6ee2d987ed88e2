use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, ItemFn};

/// Marks a function as a test and installs a `tracing` subscriber that writes
/// through the test harness before the body runs.
///
/// Set `RUST_LOG` (for example `RUST_LOG=rxflux=debug`) to see engine events.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let mut input = parse_macro_input!(item as ItemFn);

  let raw_args = proc_macro2::TokenStream::from(attr);
  if !raw_args.is_empty() {
    return TokenStream::from(
      syn::Error::new(raw_args.span(), "rxflux_macro::test does not take arguments")
        .to_compile_error(),
    );
  }

  if let Some(asyncness) = input.sig.asyncness {
    return TokenStream::from(
      syn::Error::new(
        asyncness.span(),
        "rxflux_macro::test only supports synchronous tests; drive time with \
         VirtualTimeScheduler instead of an async runtime",
      )
      .to_compile_error(),
    );
  }

  input.block.stmts.insert(
    0,
    syn::parse_quote! {
      let _ = ::tracing_subscriber::fmt()
        .with_env_filter(::tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    },
  );

  let expanded = quote! {
      #[test]
      #input
  };

  TokenStream::from(expanded)
}
