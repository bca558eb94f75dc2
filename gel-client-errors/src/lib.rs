/*!
Error handling for the Gel client core.

All fallible client operations return [`Error`]. An error carries the
4-octet code assigned by the server (or a `0xFF`-prefixed client-side
code), a chain of context messages, an optional source error, and the
headers attached by the server.

# Error kinds

Error kinds are zero-sized structs implementing [`ErrorKind`]. They are
used both to construct errors and to test membership:

```rust
use gel_client_errors::{ErrorKind, UserError};

let err = UserError::with_message("custom error");
assert!(err.is::<UserError>());
```

Membership follows the server's category hierarchy: an error belongs to
its own kind and to every ancestor category, determined by the non-zero
prefix of the kind's code.
*/

mod error;
mod kinds;
mod traits;

pub mod display;
pub mod fields;

pub use error::{Error, Tag};
pub use fields::{Field, FieldName, QueryText, ServerTraceback};
pub use kinds::*;
pub use traits::{ErrorKind, ResultExt};
