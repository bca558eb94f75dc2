/*!
The `#[derive(Queryable)]` macro.

Deriving on a struct with named fields makes it decodable from an
object shape (or named tuple) whose non-implicit fields match the
struct fields in declaration order.

Field names are resolved against the wire shape by checking the `gel`
attribute first, the legacy `edgedb` attribute second, and falling back
to the declared field name:

```rust,ignore
#[derive(Queryable)]
struct User {
    name: String,
    #[gel(rename = "email_address")]
    email: String,
    #[gel(json)]
    settings: Settings,
}
```
*/

use proc_macro::TokenStream;

mod attrib;
mod shape;

#[proc_macro_derive(Queryable, attributes(gel, edgedb))]
pub fn queryable_derive(input: TokenStream) -> TokenStream {
    let item = syn::parse_macro_input!(input as syn::ItemStruct);
    match shape::derive_struct(&item) {
        Ok(stream) => stream.into(),
        Err(e) => e.to_compile_error().into(),
    }
}
