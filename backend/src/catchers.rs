use rocket::{Request, catch, serde::json::Json};
use shared::ErrorResponse;

#[catch(403)]
pub fn forbidden(req: &Request) -> Json<ErrorResponse> {
    let error_msg = match req.uri().path().segments().last() {
        Some("votes") => "You have already voted in this poll.",
        _ => "Access forbidden."
    };

    Json(ErrorResponse::new(403, error_msg))
}

#[catch(429)]
pub fn too_many_requests(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(429, "Rate limit exceeded. Please wait before trying again."))
}

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(400, "Invalid request parameters."))
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(422, "Malformed request body."))
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(500, "An internal server error occurred."))
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(404, "The requested resource was not found."))
}
