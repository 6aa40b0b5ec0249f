//! HTTP route handlers for the portal.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Home page
//!
//! # Properties
//! GET  /imoveis                       - Listing with filters, sort and page
//! GET  /imoveis/filtrar               - Apply sidebar filters (redirect)
//! GET  /imoveis/limpar                - Clear filters (redirect)
//! GET  /imoveis/{id}                  - Property detail
//! GET  /imoveis/{id}/imagem           - Card carousel fragment (HTMX)
//!
//! # Auth
//! GET  /login                         - Sign-in page
//! POST /login                         - E-mail and password
//! POST /login/google                  - Google credential callback
//! GET  /login/telefone                - Phone sign-in page
//! POST /login/telefone                - Send verification code
//! GET  /login/telefone/verificar      - Code entry page
//! POST /login/telefone/verificar      - Check code
//! GET  /esqueci-senha                 - Password reset page
//! POST /esqueci-senha                 - Request reset e-mail
//! POST /logout                        - Sign out
//!
//! # Registration
//! GET  /cadastro                      - Sign-up form, hydrated from the draft
//! POST /cadastro                      - Submit sign-up
//! POST /cadastro/rascunho             - Autosave draft (HTMX)
//! POST /cadastro/descartar            - Discard draft
//! GET  /cadastro/creci                - CRECI step (registration or upgrade)
//! POST /cadastro/creci                - Submit CRECI and documents (multipart)
//! GET  /cadastro/concluido            - Done
//!
//! # Account (requires auth)
//! GET  /perfil                        - Profile
//! POST /perfil                        - Save profile
//! GET  /favoritos                     - Saved properties
//! POST /favoritos/{id}                - Toggle favorite (HTMX or redirect)
//! GET  /notificacoes                  - Notifications
//! POST /notificacoes/{id}/lida        - Mark read
//!
//! # Broker listings (requires verified broker)
//! GET  /anuncios                      - Own listings
//! GET  /anuncios/novo                 - New listing form
//! POST /anuncios/novo                 - Create (multipart)
//! GET  /anuncios/{id}/editar          - Edit form
//! POST /anuncios/{id}/editar          - Save (multipart)
//! ```

pub mod auth;
pub mod favorites;
pub mod home;
pub mod listings;
pub mod multipart;
pub mod notifications;
pub mod profile;
pub mod properties;
pub mod registration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::api::MAX_UPLOAD_BYTES;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Body limit of multipart posts: three documents or a batch of photos.
const UPLOAD_BODY_LIMIT: usize = 3 * MAX_UPLOAD_BYTES + 5 * 1024 * 1024;

/// Create the property routes router.
pub fn property_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(properties::index))
        .route("/filtrar", get(properties::apply_filters))
        .route("/limpar", get(properties::clear_filters))
        .route("/{id}", get(properties::show))
        .route(
            "/{id}/imagem",
            get(properties::carousel).layer(api_rate_limiter()),
        )
}

/// Create the sign-in routes router.
///
/// Posts share one strict limiter; pages are not limited.
pub fn auth_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(limiter.clone())),
        )
        .route("/login/google", post(auth::google).layer(limiter.clone()))
        .route(
            "/login/telefone",
            get(auth::phone_page).merge(post(auth::send_phone_code).layer(limiter.clone())),
        )
        .route(
            "/login/telefone/verificar",
            get(auth::verify_page).merge(post(auth::verify_phone_code).layer(limiter.clone())),
        )
        .route(
            "/esqueci-senha",
            get(auth::forgot_password_page).merge(post(auth::forgot_password).layer(limiter)),
        )
        .route("/logout", post(auth::logout))
}

/// Create the registration routes router.
pub fn registration_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();
    Router::new()
        .route(
            "/",
            get(registration::form_page).merge(post(registration::submit).layer(limiter.clone())),
        )
        .route(
            "/rascunho",
            post(registration::save_draft).layer(api_rate_limiter()),
        )
        .route("/descartar", post(registration::discard))
        .route(
            "/creci",
            get(registration::creci_page).merge(
                post(registration::submit_creci)
                    .layer::<_, std::convert::Infallible>(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
                    .layer(limiter),
            ),
        )
        .route("/concluido", get(registration::complete))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/perfil", get(profile::show).post(profile::update))
        .route("/favoritos", get(favorites::index))
        .route(
            "/favoritos/{id}",
            post(favorites::toggle).layer(api_rate_limiter()),
        )
        .route("/notificacoes", get(notifications::index))
        .route("/notificacoes/{id}/lida", post(notifications::mark_read))
}

/// Create the broker listing routes router.
pub fn listing_routes() -> Router<AppState> {
    let body_limit = DefaultBodyLimit::max(UPLOAD_BODY_LIMIT);
    Router::new()
        .route("/", get(listings::index))
        .route(
            "/novo",
            get(listings::new_page).merge(post(listings::create).layer(body_limit)),
        )
        .route(
            "/{id}/editar",
            get(listings::edit_page).merge(post(listings::update).layer(body_limit)),
        )
}

/// Create all routes for the portal.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Search and detail
        .nest("/imoveis", property_routes())
        // Sign-in, sign-out, password reset
        .merge(auth_routes())
        // Sign-up and broker upgrade
        .nest("/cadastro", registration_routes())
        // Profile, favorites, notifications
        .merge(account_routes())
        // Broker listing management
        .nest("/anuncios", listing_routes())
}
