use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use actix_web::http::StatusCode;
use std::time::Instant;
use tracing::Instrument;

/// Request logging middleware
///
/// Opens a span per request carrying a generated request id, then logs the
/// outcome with status and latency: server errors at `error`, client errors
/// at `warn`, everything else at `info`. Headers are never logged, since they
/// carry bearer tokens and the refresh cookie.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "http_request",
            %request_id,
            method = %req.method(),
            path = %req.path()
        );

        let service = self.service.clone();

        Box::pin(
            async move {
                let result = service.call(req).await;

                let status = match &result {
                    Ok(res) => res.status(),
                    // Guard rejections arrive as errors and become responses further out
                    Err(e) => e.as_response_error().status_code(),
                };
                log_outcome(status, start_time.elapsed().as_millis() as u64);

                result
            }
            .instrument(span),
        )
    }
}

fn log_outcome(status: StatusCode, elapsed_ms: u64) {
    let code = status.as_u16();
    if status.is_server_error() {
        tracing::error!(status = code, elapsed_ms, "Request failed");
    } else if status.is_client_error() {
        tracing::warn!(status = code, elapsed_ms, "Request rejected");
    } else {
        tracing::info!(status = code, elapsed_ms, "Request completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AuthError};
    use actix_web::{test, web, App, HttpResponse};
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    #[actix_web::test]
    async fn test_guard_rejection_is_logged_and_passed_on() {
        let (logs, _guard) = capture();
        let app = test::init_service(
            App::new()
                .wrap_fn(|_req, _srv| {
                    futures::future::ready(Err::<ServiceResponse, Error>(
                        AppError::Auth(AuthError::Forbidden).into(),
                    ))
                })
                .wrap(LoggerMiddleware)
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let result = app.call(test::TestRequest::get().uri("/").to_request()).await;

        let err = result.err().expect("guard error should reach the caller");
        assert_eq!(err.as_response_error().status_code(), StatusCode::FORBIDDEN);

        let output = logs.contents();
        assert!(output.contains("Request rejected"), "logs: {}", output);
        assert!(output.contains("status=403"), "logs: {}", output);
    }

    #[actix_web::test]
    async fn test_handler_error_is_logged_once_inside_request_span() {
        let (logs, _guard) = capture();
        let app = test::init_service(App::new().wrap(LoggerMiddleware).route(
            "/",
            web::get().to(|| async {
                Err::<HttpResponse, AppError>(AppError::Auth(AuthError::Unauthorized))
            }),
        ))
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let output = logs.contents();
        let error_lines: Vec<&str> = output
            .lines()
            .filter(|line| line.contains("Authentication error"))
            .collect();
        assert_eq!(error_lines.len(), 1, "logs: {}", output);
        assert!(error_lines[0].contains("http_request{request_id="), "logs: {}", output);
        assert!(error_lines[0].contains("error_id="), "logs: {}", output);
    }

    #[actix_web::test]
    async fn test_completed_request_is_logged() {
        let (logs, _guard) = capture();
        let app = test::init_service(
            App::new()
                .wrap(LoggerMiddleware)
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

        assert_eq!(res.status(), StatusCode::OK);
        let output = logs.contents();
        assert!(output.contains("Request completed"), "logs: {}", output);
        assert!(output.contains("status=200"), "logs: {}", output);
    }
}
