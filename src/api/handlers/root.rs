use axum::{extract::Extension, response::Response};
use std::sync::Arc;

use super::{auth::RequestContext, page, FLASH_INFO};
use crate::api::{
    state::AppState,
    views::{DemoPage, IndexPage},
};

pub async fn index(
    Extension(state): Extension<Arc<AppState>>,
    mut context: RequestContext,
) -> Response {
    let view = IndexPage {
        user_name: context.user.as_ref().map(|user| user.display_name()),
        infos: context.session.take_flash(FLASH_INFO),
        h5p_base_url: state.config().h5p_base_url().to_string(),
    };
    page(&state, context.session, &view).await
}

pub async fn demo(
    Extension(state): Extension<Arc<AppState>>,
    context: RequestContext,
) -> Response {
    let view = DemoPage {
        user_name: context.user.as_ref().map(|user| user.display_name()),
        h5p_base_url: state.config().h5p_base_url().to_string(),
    };
    page(&state, context.session, &view).await
}
