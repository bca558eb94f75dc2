use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use gel_client_protocol::model::Uuid;

use gel_client_errors::fields::QueryText;
use gel_client_errors::{
    ClientConnectionEosError, ClientInconsistentError, DisabledCapabilityError, Error, ErrorKind,
    NoDataError, NoResultExpected, ParameterTypeMismatchError, ProtocolEncodingError,
    ProtocolOutOfOrderError, ResultCardinalityMismatchError,
};
use gel_client_protocol::client_message::{ClientMessage, DescribeStatement, Execute, Prepare};
use gel_client_protocol::client_message::{ExecuteScript, OptimisticExecute};
use gel_client_protocol::codec::NOTHING_ID;
use gel_client_protocol::common::{
    Capabilities, Cardinality, CompilationOptions, DescribeAspect, RawTypedesc,
};
use gel_client_protocol::descriptors::Typedesc;
use gel_client_protocol::encoding::KeyValues;
use gel_client_protocol::query_arg::{Encoder, QueryArgs};
use gel_client_protocol::query_result::QueryResult;
use gel_client_protocol::server_message::{CommandDataDescription, Data, ServerMessage};

use crate::raw::connection::{Mode, QueryGist};
use crate::raw::{Connection, Response};
use crate::QueryOptions;

/// Witness that a request is in flight; returned to `Normal` by
/// observing `ReadyForCommand`.
pub struct Guard;

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub(crate) fn begin_request(&mut self) -> Result<Guard, Error> {
        match self.mode {
            Mode::Normal { .. } => {
                self.mode = Mode::Dirty;
                Ok(Guard)
            }
            Mode::Dirty => Err(ClientInconsistentError::with_message(
                "request started before previous one was read to completion",
            )),
            Mode::Terminated => Err(ClientConnectionEosError::with_message(
                "connection is closed",
            )),
        }
    }

    pub(crate) fn end_request(&mut self, _guard: Guard) {
        self.mode = Mode::Normal {
            idle_since: Instant::now(),
        };
    }

    /// Drain server messages until `ReadyForCommand`.
    pub(crate) async fn expect_ready(&mut self, guard: Guard) -> Result<(), Error> {
        loop {
            let msg = self.message().await?;
            if let ServerMessage::ReadyForCommand(ready) = msg {
                self.transaction_state = ready.transaction_state;
                self.end_request(guard);
                return Ok(());
            }
        }
    }

    pub(crate) async fn expect_ready_or_eos(&mut self, guard: Guard) -> Result<(), Error> {
        match self.expect_ready(guard).await {
            Ok(()) => Ok(()),
            Err(e) if e.is::<ClientConnectionEosError>() => {
                debug_assert!(!self.is_consistent());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Send `Sync` and drain to the next `ReadyForCommand`.
    async fn resync(&mut self, guard: Guard) -> Result<(), Error> {
        self.send_messages(&[ClientMessage::Sync]).await?;
        self.expect_ready_or_eos(guard).await
    }

    /// Prepare a statement: send `Prepare`, await `PrepareComplete`.
    ///
    /// The guard stays held; the exchange continues with describe or
    /// execute.
    async fn prepare_inner(
        &mut self,
        _guard: &Guard,
        flags: &CompilationOptions,
        query: &str,
    ) -> Result<PreparedQuery, Error> {
        self.send_messages(&[
            ClientMessage::Prepare(Prepare::new(flags, query)),
            ClientMessage::Flush,
        ])
        .await?;
        loop {
            match self.message().await? {
                ServerMessage::PrepareComplete(complete) => {
                    return Ok(PreparedQuery {
                        input_id: complete.input_typedesc_id,
                        output_id: complete.output_typedesc_id,
                        capabilities: complete.get_capabilities().unwrap_or(Capabilities::ALL),
                    });
                }
                ServerMessage::ErrorResponse(err) => return Err(err.into()),
                msg => {
                    return Err(ProtocolOutOfOrderError::with_message(format!(
                        "unsolicited message {msg:?}"
                    )))
                }
            }
        }
    }

    /// Fetch descriptor data for the just-prepared statement.
    async fn describe_inner(&mut self, _guard: &Guard) -> Result<CommandDataDescription, Error> {
        self.send_messages(&[
            ClientMessage::DescribeStatement(DescribeStatement {
                headers: KeyValues::new(),
                aspect: DescribeAspect::DataDescription,
                statement_name: Bytes::new(),
            }),
            ClientMessage::Flush,
        ])
        .await?;
        loop {
            match self.message().await? {
                ServerMessage::CommandDataDescription(desc) => return Ok(desc),
                ServerMessage::ErrorResponse(err) => return Err(err.into()),
                msg => {
                    return Err(ProtocolOutOfOrderError::with_message(format!(
                        "unsolicited message {msg:?}"
                    )))
                }
            }
        }
    }

    /// Send `Execute` and collect data frames to `CommandComplete`.
    async fn execute_inner(
        &mut self,
        guard: Guard,
        arguments: Bytes,
    ) -> Result<Response<Vec<Data>>, Error> {
        self.send_messages(&[
            ClientMessage::Execute(Execute {
                headers: KeyValues::new(),
                statement_name: Bytes::new(),
                arguments,
            }),
            ClientMessage::Sync,
        ])
        .await?;
        self.collect_execution(guard).await
    }

    async fn collect_execution(&mut self, guard: Guard) -> Result<Response<Vec<Data>>, Error> {
        let mut data = Vec::new();
        loop {
            match self.message().await? {
                ServerMessage::Data(datum) => data.push(datum),
                ServerMessage::CommandComplete(complete) => {
                    let status = complete
                        .status()
                        .map_err(ProtocolEncodingError::with_source)?
                        .to_owned();
                    let mut response = Response::new(status, data);
                    response.warnings =
                        gel_client_protocol::annotations::decode_warnings(&complete.headers)?;
                    self.expect_ready(guard).await?;
                    return Ok(response);
                }
                ServerMessage::ErrorResponse(err) => {
                    self.expect_ready_or_eos(guard)
                        .await
                        .map_err(|e| log::warn!("error waiting for Ready after error: {e:#}"))
                        .ok();
                    return Err(err.into());
                }
                msg => {
                    return Err(ProtocolOutOfOrderError::with_message(format!(
                        "unsolicited message {msg:?}"
                    )))
                }
            }
        }
    }

    fn store_typedesc(&mut self, raw: &RawTypedesc) -> Result<Arc<Typedesc>, Error> {
        let typedesc = raw.decode().map_err(ProtocolEncodingError::with_source)?;
        let typedesc = Arc::new(typedesc);
        self.typedesc_cache.insert(raw.id, typedesc.clone());
        Ok(typedesc)
    }

    fn cached_typedesc(&self, id: &Uuid) -> Option<Arc<Typedesc>> {
        if *id == NOTHING_ID {
            return Some(Arc::new(Typedesc::nothing(&self.proto)));
        }
        self.typedesc_cache.get(id).cloned()
    }

    fn encode_arguments<A: QueryArgs>(
        &self,
        input: &Typedesc,
        arguments: &A,
    ) -> Result<Bytes, Error> {
        let mut arg_buf = BytesMut::with_capacity(8);
        arguments.encode(&mut Encoder::new(
            &input.as_query_arg_context(),
            &mut arg_buf,
        ))?;
        Ok(arg_buf.freeze())
    }

    fn check_capabilities(
        &self,
        used: Capabilities,
        allowed: Capabilities,
    ) -> Result<(), Error> {
        if !allowed.contains(used) {
            return Err(DisabledCapabilityError::with_message(format!(
                "query requires capabilities {:?}, allowed {:?}",
                used, allowed
            )));
        }
        Ok(())
    }

    /// Run a query, returning raw data frames plus the typedescs needed
    /// to decode them.
    async fn query_raw<A: QueryArgs>(
        &mut self,
        query: &str,
        arguments: &A,
        options: &QueryOptions,
        cardinality: Cardinality,
    ) -> Result<(Response<Vec<Data>>, Arc<Typedesc>), Error> {
        let flags = CompilationOptions {
            implicit_limit: options.implicit_limit,
            implicit_typenames: false,
            implicit_typeids: false,
            explicit_objectids: true,
            allow_capabilities: options.allow_capabilities,
            io_format: options.io_format,
            expected_cardinality: cardinality,
        };
        let cache_key = (
            query.to_owned(),
            options.io_format as u8,
            cardinality.to_wire(),
        );

        // fast path: descriptors known from an earlier run of the same
        // query
        let gist = self
            .query_cache
            .get(&cache_key)
            .map(|g| (g.input_id, g.output_id, g.capabilities));
        if let Some((input_id, output_id, capabilities)) = gist {
            let cached = self
                .cached_typedesc(&input_id)
                .zip(self.cached_typedesc(&output_id));
            if let Some((input, output)) = cached {
                self.check_capabilities(capabilities, options.allow_capabilities)?;
                let argdata = self.encode_arguments(&input, arguments)?;
                match self
                    .optimistic_execute(&flags, query, argdata, input_id, output_id)
                    .await?
                {
                    OptimisticOutcome::Complete(response) => return Ok((response, output)),
                    OptimisticOutcome::Restarted(desc) => {
                        let input = self.store_typedesc(&desc.input)?;
                        let output = self.store_typedesc(&desc.output)?;
                        if let Some(gist) = self.query_cache.get_mut(&cache_key) {
                            gist.input_id = desc.input.id;
                            gist.output_id = desc.output.id;
                        }
                        let argdata = self.encode_arguments(&input, arguments)?;
                        let guard = self.begin_request()?;
                        self.send_optimistic(&flags, query, argdata, desc.input.id, desc.output.id)
                            .await?;
                        let response = self.collect_execution(guard).await?;
                        return Ok((response, output));
                    }
                }
            }
        }

        // slow path: prepare, describe when descriptors are unknown,
        // then execute
        let guard = self.begin_request()?;
        let prepared = match self.prepare_inner(&guard, &flags, query).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.resync(guard).await.ok();
                return Err(e);
            }
        };
        if let Err(e) = self.check_capabilities(prepared.capabilities, options.allow_capabilities)
        {
            self.resync(guard).await.ok();
            return Err(e);
        }

        let cached = self
            .cached_typedesc(&prepared.input_id)
            .zip(self.cached_typedesc(&prepared.output_id));
        let (input, output) = match cached {
            Some(pair) => pair,
            None => {
                let stored = match self.describe_inner(&guard).await {
                    Ok(desc) => self
                        .store_typedesc(&desc.input)
                        .and_then(|input| Ok((input, self.store_typedesc(&desc.output)?))),
                    Err(e) => Err(e),
                };
                match stored {
                    Ok(pair) => pair,
                    Err(e) => {
                        self.resync(guard).await.ok();
                        return Err(e);
                    }
                }
            }
        };

        let argdata = match self.encode_arguments(&input, arguments) {
            Ok(argdata) => argdata,
            Err(e) => {
                self.resync(guard).await.ok();
                return Err(e);
            }
        };

        self.query_cache.insert(
            cache_key,
            QueryGist {
                input_id: prepared.input_id,
                output_id: prepared.output_id,
                capabilities: prepared.capabilities,
            },
        );
        let response = self.execute_inner(guard, argdata).await?;
        Ok((response, output))
    }

    async fn send_optimistic(
        &mut self,
        flags: &CompilationOptions,
        query: &str,
        arguments: Bytes,
        input_id: Uuid,
        output_id: Uuid,
    ) -> Result<(), Error> {
        self.send_messages(&[
            ClientMessage::OptimisticExecute(OptimisticExecute::new(
                flags, query, arguments, input_id, output_id,
            )),
            ClientMessage::Sync,
        ])
        .await
    }

    /// Execute against cached descriptor ids. If the server's codecs
    /// changed it replies with a fresh `CommandDataDescription`; the
    /// caller recompiles and retries once.
    async fn optimistic_execute(
        &mut self,
        flags: &CompilationOptions,
        query: &str,
        arguments: Bytes,
        input_id: Uuid,
        output_id: Uuid,
    ) -> Result<OptimisticOutcome, Error> {
        let guard = self.begin_request()?;
        self.send_optimistic(flags, query, arguments, input_id, output_id)
            .await?;

        let mut data = Vec::new();
        let mut fresh_desc = None;
        loop {
            match self.message().await? {
                ServerMessage::Data(datum) => data.push(datum),
                ServerMessage::CommandDataDescription(desc) => {
                    fresh_desc = Some(desc);
                }
                ServerMessage::CommandComplete(complete) => {
                    let status = complete
                        .status()
                        .map_err(ProtocolEncodingError::with_source)?
                        .to_owned();
                    let mut response = Response::new(status, data);
                    response.warnings =
                        gel_client_protocol::annotations::decode_warnings(&complete.headers)?;
                    self.expect_ready(guard).await?;
                    return Ok(OptimisticOutcome::Complete(response));
                }
                ServerMessage::ErrorResponse(err) => {
                    self.expect_ready_or_eos(guard)
                        .await
                        .map_err(|e| log::warn!("error waiting for Ready after error: {e:#}"))
                        .ok();
                    let err: Error = err.into();
                    match fresh_desc {
                        Some(desc) if err.is::<ParameterTypeMismatchError>() => {
                            return Ok(OptimisticOutcome::Restarted(desc));
                        }
                        _ => return Err(err),
                    }
                }
                msg => {
                    return Err(ProtocolOutOfOrderError::with_message(format!(
                        "unsolicited message {msg:?}"
                    )))
                }
            }
        }
    }

    /// Run a query and decode every returned row into `R`.
    pub async fn query<R, A>(
        &mut self,
        query: &str,
        arguments: &A,
        options: QueryOptions,
    ) -> Result<Response<Vec<R>>, Error>
    where
        R: QueryResult,
        A: QueryArgs,
    {
        self.query_with_cardinality(query, arguments, &options, Cardinality::Many)
            .await
            .map_err(|e| e.set::<QueryText>(query))
    }

    /// Run a query expected to return at most one row.
    pub async fn query_single<R, A>(
        &mut self,
        query: &str,
        arguments: &A,
        options: QueryOptions,
    ) -> Result<Option<R>, Error>
    where
        R: QueryResult,
        A: QueryArgs,
    {
        let response = self
            .query_with_cardinality::<R, A>(query, arguments, &options, Cardinality::AtMostOne)
            .await
            .map_err(|e| e.set::<QueryText>(query))?;
        let mut rows = response.data;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(ResultCardinalityMismatchError::with_message(format!(
                "query returned {n} rows, one at most expected"
            ))
            .set::<QueryText>(query)),
        }
    }

    /// Run a query that must return exactly one row.
    pub async fn query_required_single<R, A>(
        &mut self,
        query: &str,
        arguments: &A,
        options: QueryOptions,
    ) -> Result<R, Error>
    where
        R: QueryResult,
        A: QueryArgs,
    {
        self.query_single(query, arguments, options)
            .await?
            .ok_or_else(|| {
                NoDataError::with_message("query returned no rows, one expected")
                    .set::<QueryText>(query)
            })
    }

    async fn query_with_cardinality<R, A>(
        &mut self,
        query: &str,
        arguments: &A,
        options: &QueryOptions,
        cardinality: Cardinality,
    ) -> Result<Response<Vec<R>>, Error>
    where
        R: QueryResult,
        A: QueryArgs,
    {
        let (response, out_desc) = self
            .query_raw(query, arguments, options, cardinality)
            .await?;
        response.log_warnings();
        match out_desc.root_pos() {
            Some(root_pos) => {
                let ctx = out_desc.as_queryable_context();
                let mut state = R::prepare(&ctx, root_pos)?;
                response.map(|data| {
                    data.into_iter()
                        .flat_map(|chunk| chunk.data)
                        .map(|chunk| R::decode(&mut state, &chunk))
                        .collect::<Result<Vec<_>, _>>()
                })
            }
            None => Err(NoResultExpected::with_message(
                "statement has no result, use execute instead",
            )),
        }
    }

    /// Run a statement for its side effects, ignoring any result.
    pub async fn execute<A>(
        &mut self,
        query: &str,
        arguments: &A,
        options: QueryOptions,
    ) -> Result<Response<()>, Error>
    where
        A: QueryArgs,
    {
        let result = self
            .query_raw(query, arguments, &options, Cardinality::Many)
            .await
            .map_err(|e| e.set::<QueryText>(query))?;
        let (response, _) = result;
        response.log_warnings();
        response.map(|_| Ok::<_, Error>(()))
    }

    /// Run a script of semicolon-separated statements.
    pub async fn execute_script(&mut self, script: &str) -> Result<String, Error> {
        let guard = self.begin_request()?;
        self.send_messages(&[ClientMessage::ExecuteScript(ExecuteScript {
            headers: KeyValues::new(),
            script_text: script.into(),
        })])
        .await?;
        loop {
            match self.message().await? {
                ServerMessage::CommandComplete(complete) => {
                    let status = complete
                        .status()
                        .map_err(ProtocolEncodingError::with_source)?
                        .to_owned();
                    self.expect_ready(guard).await?;
                    return Ok(status);
                }
                ServerMessage::Data(_) => {}
                ServerMessage::ErrorResponse(err) => {
                    self.expect_ready_or_eos(guard)
                        .await
                        .map_err(|e| log::warn!("error waiting for Ready after error: {e:#}"))
                        .ok();
                    return Err(Error::from(err).set::<QueryText>(script));
                }
                msg => {
                    return Err(ProtocolOutOfOrderError::with_message(format!(
                        "unsolicited message {msg:?}"
                    )))
                }
            }
        }
    }
}

struct PreparedQuery {
    input_id: Uuid,
    output_id: Uuid,
    capabilities: Capabilities,
}

enum OptimisticOutcome {
    Complete(Response<Vec<Data>>),
    Restarted(CommandDataDescription),
}
