use yew::prelude::*;
use yew_router::prelude::*;
use log::info;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

mod config;
mod error;
mod fomo {
    pub mod codec;
    pub mod engine;
    pub mod gender;
    pub mod identity;
    pub mod payload;
    pub mod queue;
    pub mod scheduler;
    pub mod seen;
    pub mod store;
    pub mod sync;
    pub mod web;
    #[cfg(test)]
    pub mod testing;
}
mod components {
    pub mod fomo_toasts;
    pub mod testimonials;
}
mod pages {
    pub mod home;
}

use pages::home::{Home, NotFound};

#[derive(Clone, Routable, PartialEq)]
pub enum Route {
    #[at("/")]
    Home,
    #[not_found]
    #[at("/404")]
    NotFound,
}

fn switch(routes: Route) -> Html {
    match routes {
        Route::Home => {
            info!("Rendering Home page");
            html! { <Home /> }
        }
        Route::NotFound => {
            info!("Rendering not found page");
            html! { <NotFound /> }
        }
    }
}

#[function_component(Nav)]
pub fn nav() -> Html {
    let is_scrolled = use_state(|| false);

    {
        let is_scrolled = is_scrolled.clone();
        use_effect_with_deps(move |_| {
            let window = web_sys::window();
            let scroll_callback = window.as_ref().map(|window| {
                let window = window.clone();
                Closure::wrap(Box::new(move || {
                    is_scrolled.set(window.scroll_y().unwrap_or(0.0) > 40.0);
                }) as Box<dyn FnMut()>)
            });

            if let (Some(window), Some(callback)) = (window.as_ref(), scroll_callback.as_ref()) {
                let _ = window.add_event_listener_with_callback("scroll", callback.as_ref().unchecked_ref());
            }

            move || {
                if let (Some(window), Some(callback)) = (window, scroll_callback) {
                    let _ = window.remove_event_listener_with_callback("scroll", callback.as_ref().unchecked_ref());
                }
            }
        }, ());
    }

    html! {
        <nav class={classes!("top-nav", (*is_scrolled).then(|| "scrolled"))}>
            <div class="nav-content">
                <Link<Route> to={Route::Home} classes="nav-logo">
                    {"EDS"}
                </Link<Route>>
                <div class="nav-right">
                    <a href="/#packages" class="nav-link">{"Packages"}</a>
                    <a href="/#testimonials" class="nav-link">{"Testimonials"}</a>
                </div>
            </div>
        </nav>
    }
}

#[function_component]
fn App() -> Html {
    html! {
        <BrowserRouter>
            <Nav />
            <Switch<Route> render={switch} />
        </BrowserRouter>
    }
}

fn main() {
    // Initialize console error panic hook for better error messages
    console_error_panic_hook::set_once();

    // Initialize logging
    console_log::init_with_level(config::log_level()).expect("error initializing log");

    info!("Starting application");
    yew::Renderer::<App>::new().render();
}
