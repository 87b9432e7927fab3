use dispatchbox::Dispatcher;
use dispatchbox::config::Config;
use dispatchbox::lifecycle::{CallbackRegistry, Outcome, Response};
use dispatchbox::request::{FormInput, RequestDescription, RequestOptions};
use dispatchbox::transport::HttpTransport;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use crate::cli::SendArgs;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

const PRINT_RESPONSE: &str = "print_response";

pub async fn run(args: SendArgs, config: Config) -> Result<(), AnyError> {
    let registry = registry();
    let options = match args.request.clone() {
        Some(path) => description_options(&path, &registry)?,
        None => flag_options(args, &registry),
    };

    let transport = HttpTransport::new(&config.transport)?;
    let dispatcher = Dispatcher::from_config(&config);
    let mut dispatched = dispatcher.dispatch(options, transport)?;

    let Some(mut completion) = dispatched.take_completion() else {
        return Err("request completion unavailable".into());
    };

    let settled = tokio::select! {
        outcome = &mut completion => Some(outcome.ok()),
        _ = tokio::signal::ctrl_c() => None,
    };
    let outcome = match settled {
        Some(outcome) => outcome,
        None => {
            info!("Interrupt received, aborting request");
            dispatched.abort();
            completion.await.ok()
        }
    };

    match outcome {
        Some(Outcome::Succeeded { status }) => {
            info!(status, "Request completed");
            Ok(())
        }
        Some(outcome) => Err(format!("request {}", outcome).into()),
        None => Err("request ended without an outcome".into()),
    }
}

fn registry() -> CallbackRegistry {
    let mut registry = CallbackRegistry::with_defaults();
    registry.register_success(PRINT_RESPONSE, print_response);
    registry
}

fn print_response(response: Response) {
    info!(status = response.status, "Response received");
    println!("{}", response.body);
}

fn description_options(path: &Path, registry: &CallbackRegistry) -> Result<RequestOptions, AnyError> {
    let mut description = RequestDescription::load(path)?;
    if description.on_success.is_none() {
        description.on_success = Some(Value::String(PRINT_RESPONSE.to_string()));
    }
    Ok(description.into_options(registry)?)
}

fn flag_options(args: SendArgs, registry: &CallbackRegistry) -> RequestOptions {
    let mut options = RequestOptions::new()
        .method(args.method.unwrap_or_else(|| "GET".to_string()))
        .headers(args.headers)
        .force_insecure(args.insecure)
        .on_success(print_response)
        .on_failure(|failure| warn!(error = %failure.kind, "Request failed"));

    options.callbacks.on_loading = registry
        .get("log_progress")
        .ok()
        .and_then(|callback| callback.as_progress());

    if let Some(url) = args.url {
        options = options.url(url);
    }
    if let Some(data) = args.data {
        options = options.data(data);
    }
    if !args.fields.is_empty() || args.markup.is_some() {
        options = options.form(FormInput {
            fields: args.fields,
            markup: args.markup.unwrap_or_default(),
        });
    }
    if let Some(consumes) = args.consumes {
        options = options.consumes(consumes);
    }
    if let Some(encoding) = args.encoding {
        options = options.encoding(encoding);
    }
    if let Some((username, password)) = args.user {
        options = options.credentials(username, password);
    }

    options
}
