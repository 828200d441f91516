use std::{future::Future, rc::Rc, time::Duration};

use futures::{
    future::{ready, select, Either, LocalBoxFuture},
    pin_mut, FutureExt,
};
use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{batch, AbortController, AbortSignal, ActionContext, State, SystemTimer, Timer, Value};


/// The trigger that caused a validation round.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromStr, Serialize, Deserialize,
)]
#[display(style = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ValidatorEvent {
    OnChange,
    OnBlur,
    OnSubmit,
    OnMount,
}

impl ValidatorEvent {
    pub const ALL: [ValidatorEvent; 4] = [
        ValidatorEvent::OnChange,
        ValidatorEvent::OnBlur,
        ValidatorEvent::OnSubmit,
        ValidatorEvent::OnMount,
    ];
}

/// A validation message, or `None` when the value is valid.
pub type ValidationError = Option<String>;

fn is_error(error: &ValidationError) -> bool {
    error.as_deref().is_some_and(|e| !e.is_empty())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum ValidationChannel {
    Sync,
    Async,
}

/// Current errors of one field, each with the event that produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationErrorMap {
    #[serde(rename = "sync", skip_serializing_if = "Option::is_none")]
    pub sync_error: ValidationError,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error_event: Option<ValidatorEvent>,
    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub async_error: ValidationError,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_error_event: Option<ValidatorEvent>,
}

impl ValidationErrorMap {
    pub fn channel(&self, channel: ValidationChannel) -> (&ValidationError, Option<ValidatorEvent>) {
        match channel {
            ValidationChannel::Sync => (&self.sync_error, self.sync_error_event),
            ValidationChannel::Async => (&self.async_error, self.async_error_event),
        }
    }
    fn set_channel(
        &mut self,
        channel: ValidationChannel,
        error: ValidationError,
        event: Option<ValidatorEvent>,
    ) {
        match channel {
            ValidationChannel::Sync => {
                self.sync_error = error;
                self.sync_error_event = event;
            }
            ValidationChannel::Async => {
                self.async_error = error;
                self.async_error_event = event;
            }
        }
    }

    /// The message to display: the sync error if there is one, else the async error.
    pub fn first_error(&self) -> Option<&str> {
        [&self.sync_error, &self.async_error]
            .into_iter()
            .find(|e| is_error(e))
            .and_then(|e| e.as_deref())
    }
    pub fn has_error(&self) -> bool {
        self.first_error().is_some()
    }
}

/// When a validator runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorOptions {
    /// Do not run when the value changes.
    pub disable_on_change_validation: bool,
    /// Do not run when the input loses focus.
    pub disable_on_blur_validation: bool,
    /// Run when the field is mounted.
    pub validate_on_mount: bool,
    /// Run on change only once the field has been touched.
    pub validate_on_change_if_touched: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorAsyncOptions {
    #[serde(flatten)]
    pub base: ValidatorOptions,
    /// Quiet period before the validator is invoked. Ignored for `onSubmit`.
    pub debounce_ms: Option<u64>,
}

impl ValidatorAsyncOptions {
    pub fn debounce(&self) -> Option<Duration> {
        self.debounce_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Decides whether a configured validator runs for `event`.
///
/// Without options every event except `onMount` runs.
pub fn should_validate_event(
    event: ValidatorEvent,
    options: Option<&ValidatorOptions>,
    is_touched: bool,
) -> bool {
    let Some(options) = options else {
        return event != ValidatorEvent::OnMount;
    };
    match event {
        ValidatorEvent::OnChange => {
            !options.disable_on_change_validation
                && (!options.validate_on_change_if_touched || is_touched)
        }
        ValidatorEvent::OnBlur => !options.disable_on_blur_validation,
        ValidatorEvent::OnMount => options.validate_on_mount,
        ValidatorEvent::OnSubmit => true,
    }
}

pub trait SyncValidator {
    fn validate(&self, value: &Value) -> ValidationError;
}
impl<F> SyncValidator for F
where
    F: Fn(&Value) -> ValidationError,
{
    fn validate(&self, value: &Value) -> ValidationError {
        self(value)
    }
}

/// An async validator.
///
/// The signal is advisory: a round that was superseded has its result discarded whether or not
/// the validator honours it.
pub trait AsyncValidator {
    fn validate(&self, value: Value, signal: AbortSignal) -> LocalBoxFuture<'static, ValidationError>;
}
impl<F, Fut> AsyncValidator for F
where
    F: Fn(Value, AbortSignal) -> Fut,
    Fut: Future<Output = ValidationError> + 'static,
{
    fn validate(&self, value: Value, signal: AbortSignal) -> LocalBoxFuture<'static, ValidationError> {
        self(value, signal).boxed_local()
    }
}

/// Bridge from a schema library to the two validator shapes.
pub trait ValidatorAdapter {
    type Schema;
    fn sync_validator(&self, schema: &Self::Schema) -> Rc<dyn SyncValidator>;
    fn async_validator(&self, schema: &Self::Schema) -> Rc<dyn AsyncValidator>;
}

/// The validators configured for one field.
#[derive(Clone, Default)]
pub struct Validators {
    pub sync_validator: Option<Rc<dyn SyncValidator>>,
    pub sync_options: Option<ValidatorOptions>,
    pub async_validator: Option<Rc<dyn AsyncValidator>>,
    pub async_options: Option<ValidatorAsyncOptions>,
}

impl Validators {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn from_adapter<A: ValidatorAdapter>(
        adapter: &A,
        sync_schema: Option<&A::Schema>,
        async_schema: Option<&A::Schema>,
    ) -> Self {
        Self {
            sync_validator: sync_schema.map(|s| adapter.sync_validator(s)),
            async_validator: async_schema.map(|s| adapter.async_validator(s)),
            ..Self::default()
        }
    }
    pub fn with_sync(mut self, validator: impl SyncValidator + 'static) -> Self {
        self.sync_validator = Some(Rc::new(validator));
        self
    }
    pub fn with_sync_options(mut self, options: ValidatorOptions) -> Self {
        self.sync_options = Some(options);
        self
    }
    pub fn with_async(mut self, validator: impl AsyncValidator + 'static) -> Self {
        self.async_validator = Some(Rc::new(validator));
        self
    }
    pub fn with_async_options(mut self, options: ValidatorAsyncOptions) -> Self {
        self.async_options = Some(options);
        self
    }
}

/// Validation state of one field: its error map, whether an async round is running, and the
/// cancellation handle of that round.
#[derive(Clone)]
pub struct FieldValidation {
    error_map: State<ValidationErrorMap>,
    is_validating: State<bool>,
    abort_controller: State<Option<AbortController>>,
    timer: Rc<dyn Timer>,
}

impl Default for FieldValidation {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldValidation {
    pub fn new() -> Self {
        Self::with_timer(Rc::new(SystemTimer))
    }
    pub fn with_timer(timer: Rc<dyn Timer>) -> Self {
        Self {
            error_map: State::new(ValidationErrorMap::default()),
            is_validating: State::new(false),
            abort_controller: State::new(None),
            timer,
        }
    }

    pub fn error_map(&self) -> &State<ValidationErrorMap> {
        &self.error_map
    }
    pub fn is_validating(&self) -> &State<bool> {
        &self.is_validating
    }
    pub fn abort_controller(&self) -> &State<Option<AbortController>> {
        &self.abort_controller
    }

    /// Runs the validators configured for `event`.
    ///
    /// The sync phase, and the setup of the async phase (superseding the previous round, marking
    /// the field as validating), happen before this returns. The returned future performs the
    /// debounce and the async validator and commits the result; the caller drives it. If the sync
    /// validator reports an error and `accumulate_errors` is not set, no async round starts.
    ///
    /// Non-empty `mixins` are passed to the validators as `[value, ...mixins]`.
    pub fn validate(
        &self,
        value: &Value,
        mixins: &[Value],
        event: ValidatorEvent,
        validators: &Validators,
        accumulate_errors: bool,
        is_touched: bool,
    ) -> LocalBoxFuture<'static, ()> {
        let input = validator_input(value, mixins);
        let sync_failed = self.validate_sync(&input, event, validators, is_touched);
        if sync_failed && !accumulate_errors {
            return ready(()).boxed_local();
        }
        self.validate_async(input, event, validators, is_touched)
    }

    fn validate_sync(
        &self,
        input: &Value,
        event: ValidatorEvent,
        validators: &Validators,
        is_touched: bool,
    ) -> bool {
        let Some(validator) = &validators.sync_validator else {
            return false;
        };
        if !should_validate_event(event, validators.sync_options.as_ref(), is_touched) {
            return false;
        }
        let error = validator.validate(input);
        let failed = is_error(&error);
        batch(|ac| set_channel_error(&self.error_map, ValidationChannel::Sync, error, event, ac));
        failed
    }

    fn validate_async(
        &self,
        input: Value,
        event: ValidatorEvent,
        validators: &Validators,
        is_touched: bool,
    ) -> LocalBoxFuture<'static, ()> {
        let Some(validator) = validators.async_validator.clone() else {
            return ready(()).boxed_local();
        };
        let options = validators.async_options.as_ref();
        if !should_validate_event(event, options.map(|o| &o.base), is_touched) {
            return ready(()).boxed_local();
        }
        let debounce = options
            .and_then(ValidatorAsyncOptions::debounce)
            .filter(|_| event != ValidatorEvent::OnSubmit);

        let controller = AbortController::new();
        batch(|ac| {
            if let Some(previous) = self.abort_controller.peek() {
                if !previous.is_aborted() {
                    debug!(%event, "superseding in-flight async validation");
                }
                previous.abort();
            }
            self.abort_controller.set(Some(controller.clone()), ac);
            self.is_validating.set_dedup(true, ac);
        });
        debug!(%event, ?debounce, "async validation started");

        let signal = controller.signal();
        let error_map = self.error_map.clone();
        let is_validating = self.is_validating.clone();
        let pending = match debounce {
            Some(delay) => debounced(validator, input, signal.clone(), self.timer.sleep(delay)),
            None => validator.validate(input, signal.clone()),
        };
        async move {
            let error = pending.await;
            if signal.is_aborted() {
                debug!(%event, "discarding result of superseded async validation");
                return;
            }
            debug!(%event, error = ?error, "async validation finished");
            batch(|ac| {
                is_validating.set_dedup(false, ac);
                set_channel_error(&error_map, ValidationChannel::Async, error, event, ac);
            });
        }
        .boxed_local()
    }

    /// Clears the channels whose current error was produced by `onSubmit`.
    pub fn clear_submit_errors(&self) {
        clear_submit_errors(&self.error_map);
    }
}

fn debounced(
    validator: Rc<dyn AsyncValidator>,
    input: Value,
    signal: AbortSignal,
    sleep: LocalBoxFuture<'static, ()>,
) -> LocalBoxFuture<'static, ValidationError> {
    async move {
        let aborted = signal.aborted();
        pin_mut!(aborted);
        match select(sleep, aborted).await {
            Either::Left(_) => validator.validate(input, signal.clone()).await,
            Either::Right(_) => None,
        }
    }
    .boxed_local()
}

fn validator_input(value: &Value, mixins: &[Value]) -> Value {
    if mixins.is_empty() {
        value.clone()
    } else {
        Value::Array(std::iter::once(value).chain(mixins).cloned().collect())
    }
}

fn set_channel_error(
    error_map: &State<ValidationErrorMap>,
    channel: ValidationChannel,
    error: ValidationError,
    event: ValidatorEvent,
    ac: &mut ActionContext,
) {
    let unchanged = {
        let map = error_map.borrow_peek();
        let (current, current_event) = map.channel(channel);
        *current == error && current_event == Some(event)
    };
    if !unchanged {
        error_map
            .borrow_mut(ac)
            .set_channel(channel, error, Some(event));
    }
}

/// Resets the channels of `error_map` whose error was produced by `onSubmit`.
///
/// Errors attributed to other events are kept. Nothing is written if no channel is affected.
pub fn clear_submit_errors(error_map: &State<ValidationErrorMap>) {
    let affected: Vec<ValidationChannel> = {
        let map = error_map.borrow_peek();
        [ValidationChannel::Sync, ValidationChannel::Async]
            .into_iter()
            .filter(|c| map.channel(*c).1 == Some(ValidatorEvent::OnSubmit))
            .collect()
    };
    if affected.is_empty() {
        return;
    }
    batch(|ac| {
        let mut map = error_map.borrow_mut(ac);
        for channel in affected {
            map.set_channel(channel, None, None);
        }
    });
}
