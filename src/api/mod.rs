use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;

mod motion;
mod vote;
mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(motion::routes());
    routes.extend(vote::routes());
    routes.extend(voter::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Errors raised by Rocket itself (no matching route, a failed request
/// guard) get the same JSON body as errors raised by handlers.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    let kind = match status.code {
        404 => "NotFound",
        500..=599 => "Internal",
        _ => "InvalidInput",
    };
    let body = ErrorBody {
        kind: kind.to_string(),
        message: status.reason().unwrap_or("Unknown error").to_string(),
    };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use rocket::local::asynchronous::Client;
    use rocket::serde::json::serde_json;

    use super::*;

    #[backend_test]
    async fn unmatched_requests_get_json_errors(client: Client) {
        let response = client.get("/nowhere").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let body = response.into_string().await.unwrap();
        let error: ErrorBody = serde_json::from_str(&body).unwrap();
        assert_eq!(error.kind, "NotFound");

        // Page parameters are checked by a request guard.
        let response = client.get("/voters?page_size=0").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());
        let body = response.into_string().await.unwrap();
        let error: ErrorBody = serde_json::from_str(&body).unwrap();
        assert_eq!(error.kind, "InvalidInput");
    }
}
