//! Lifecycle hooks and error recovery on single-value publishers.

use std::sync::{Arc, Mutex};

use rxflux::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("runtime failure")]
struct RuntimeFailure;

fn runtime_failure() -> Error { Error::from_source(RuntimeFailure) }

fn log<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Arc<Mutex<Vec<T>>>) {
  let log = Arc::new(Mutex::new(vec![]));
  (log.clone(), log)
}

#[rxflux_macro::test]
fn do_on_subscribe() {
  let (subscribed, c_subscribed) = log();
  let publisher =
    mono::just("value").do_on_subscribe(move |_| c_subscribed.lock().unwrap().push("subscription added"));

  publisher.subscribe(|v| tracing::info!("{v}"));
  StepVerifier::create(&publisher).expect_next("value").verify_complete().unwrap();
  assert_eq!(subscribed.lock().unwrap().len(), 2);
}

#[rxflux_macro::test]
fn do_on_request() {
  let (requests, c_requests) = log();
  let publisher = mono::just("value").do_on_request(move |n| c_requests.lock().unwrap().push(n));

  publisher.subscribe(|v| tracing::info!("{v}"));
  publisher.subscribe_full(|v| tracing::info!("{v}"), |_| {}, || {}, |subscription| subscription.request(2));
  StepVerifier::create(&publisher).expect_next("value").verify_complete().unwrap();

  assert_eq!(*requests.lock().unwrap(), vec![UNBOUNDED, 2, UNBOUNDED]);
}

#[rxflux_macro::test]
fn do_on_error() {
  let (errors, c_errors) = log();
  let publisher = mono::error_with::<&str, _>(runtime_failure)
    .do_on_error(move |e| c_errors.lock().unwrap().push(e.to_string()));
  publisher.subscribe(|v| tracing::info!("{v}"));

  StepVerifier::create(&publisher).expect_error_of::<RuntimeFailure>().verify().unwrap();
  assert_eq!(*errors.lock().unwrap(), vec!["source error: runtime failure"; 2]);
}

#[rxflux_macro::test]
fn do_on_success() {
  let (successes, c_successes) = log();
  let publisher = mono::just("value")
    .do_on_success(move |last| c_successes.lock().unwrap().push(last.map(|v| v.to_string())));
  publisher.subscribe(|v| tracing::info!("{v}"));
  StepVerifier::create(mono::empty::<&str>().do_on_success({
    let c_successes = successes.clone();
    move |last| c_successes.lock().unwrap().push(last.map(|v| v.to_string()))
  }))
  .verify_complete()
  .unwrap();

  StepVerifier::create(&publisher).expect_next("value").verify_complete().unwrap();
  assert_eq!(*successes.lock().unwrap(), vec![Some("value".to_string()), None, Some("value".to_string())]);
}

#[rxflux_macro::test]
fn do_on_each() {
  let (kinds, c_kinds) = log();
  let publisher = mono::just("value").do_on_each(move |signal| c_kinds.lock().unwrap().push(signal.kind()));

  StepVerifier::create(&publisher).expect_next("value").verify_complete().unwrap();
  assert_eq!(*kinds.lock().unwrap(), vec![SignalKind::OnNext, SignalKind::OnComplete]);
}

#[rxflux_macro::test]
fn on_error_return() {
  let fallback = "fallback data";
  let publisher = mono::error_with::<&str, _>(runtime_failure).on_error_return(fallback);

  let (seen, c_seen) = log();
  publisher.subscribe(move |v| c_seen.lock().unwrap().push(v));
  assert_eq!(*seen.lock().unwrap(), vec![fallback]);

  StepVerifier::create(&publisher).expect_next(fallback).verify_complete().unwrap();
}

#[rxflux_macro::test]
fn on_error_resume_by_cause() {
  let recovery = "threw Runtime Exception";
  let recovered = mono::error_with::<&str, _>(runtime_failure)
    .on_error_resume_on(move |_: &RuntimeFailure| mono::just(recovery));
  StepVerifier::create(recovered).expect_next(recovery).verify_complete().unwrap();

  let unrelated = mono::error::<&str>(Error::message("other"))
    .on_error_resume_on(move |_: &RuntimeFailure| mono::just(recovery));
  StepVerifier::create(unrelated).expect_error_kind(ErrorKind::Source).verify().unwrap();
}
