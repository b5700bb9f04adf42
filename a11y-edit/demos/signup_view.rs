use ui::button::Button;
use ui::field::{EmailField, TextField};
use ui::html::Image;
use ui::layout::VerticalLayout;
use ui::router::route;

#[route("signup")]
pub struct SignupView(VerticalLayout);

impl SignupView {
    pub fn new() -> Self {
        let view = Self(VerticalLayout::new());

        let name = TextField::new();
        view.add(&name);

        let email = EmailField::new();
        view.add(&email);

        let logo = Image::new("logo.png");
        view.add(&logo);

        view.add(&Button::new("Sign up"));
        view
    }
}
