/*!
Contains the [QueryResult] trait.
*/

use std::sync::Arc;

use bytes::Bytes;

use gel_client_errors::{DescriptorMismatch, ProtocolEncodingError};
use gel_client_errors::{Error, ErrorKind};

use crate::codec::Codec;
use crate::descriptors::TypePos;
use crate::queryable::{Decoder, DescriptorContext, Queryable};
use crate::value::Value;

pub trait Sealed: Sized {}

/// A single result row (or row element) of a query.
///
/// Implemented for every [Queryable] type and for the dynamic [Value].
pub trait QueryResult: Sealed {
    type State;
    fn prepare(ctx: &DescriptorContext, root_pos: TypePos) -> Result<Self::State, Error>;
    fn decode(state: &mut Self::State, msg: &Bytes) -> Result<Self, Error>;
}

impl<T: Queryable> Sealed for T {}

impl Sealed for Value {}

impl<T: Queryable> QueryResult for T {
    type State = (Decoder, T::Args);
    fn prepare(ctx: &DescriptorContext, root_pos: TypePos) -> Result<Self::State, Error> {
        let args = T::check_descriptor(ctx, root_pos).map_err(DescriptorMismatch::with_source)?;
        Ok((ctx.build_decoder(), args))
    }
    fn decode((decoder, args): &mut Self::State, msg: &Bytes) -> Result<Self, Error> {
        Queryable::decode(decoder, args, msg).map_err(ProtocolEncodingError::with_source)
    }
}

impl QueryResult for Value {
    type State = Arc<dyn Codec>;
    fn prepare(ctx: &DescriptorContext, root_pos: TypePos) -> Result<Arc<dyn Codec>, Error> {
        crate::codec::build_codec(Some(root_pos), ctx.descriptors)
            .map_err(ProtocolEncodingError::with_source)
    }
    fn decode(codec: &mut Arc<dyn Codec>, msg: &Bytes) -> Result<Self, Error> {
        codec.decode(msg).map_err(ProtocolEncodingError::with_source)
    }
}
