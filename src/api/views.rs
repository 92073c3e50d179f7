//! HTML views, rendered with askama from `templates/`.

use askama::Template;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub user_name: Option<String>,
    pub infos: Vec<String>,
    pub h5p_base_url: String,
}

#[derive(Template)]
#[template(path = "registration.html")]
pub struct RegistrationPage {
    pub validation_errors: Vec<String>,
    pub errors: Vec<String>,
    pub min_length: usize,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub errors: Vec<String>,
    pub infos: Vec<String>,
}

#[derive(Template)]
#[template(path = "demo.html")]
pub struct DemoPage {
    pub user_name: Option<String>,
    pub h5p_base_url: String,
}

#[derive(Template)]
#[template(path = "h5p_content.html")]
pub struct H5pContentPage {
    pub base_url: String,
    pub user_name: String,
    pub content_ids: Vec<String>,
}
