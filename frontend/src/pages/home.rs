use yew::prelude::*;
use yew_router::prelude::*;

use crate::components::fomo_toasts::{FomoToasts, ToastPosition};
use crate::components::testimonials::Testimonials;
use crate::fomo::payload::PACKAGES;
use crate::Route;

#[function_component(Home)]
pub fn home() -> Html {
    html! {
        <div class="home">
            <style>
                {r#"
                    .home {
                        font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
                        color: #111;
                    }
                    .hero {
                        padding: 120px 16px 64px;
                        text-align: center;
                    }
                    .hero h1 {
                        font-size: clamp(2rem, 5vw, 3.5rem);
                        margin: 0 0 16px;
                    }
                    .packages {
                        display: grid;
                        gap: 16px;
                        max-width: 1100px;
                        margin: 0 auto;
                        padding: 0 16px 48px;
                    }
                    @media (min-width: 768px) {
                        .packages { grid-template-columns: repeat(4, 1fr); }
                    }
                    .package {
                        padding: 20px;
                        border-radius: 16px;
                        border: 1px solid rgba(0, 0, 0, 0.1);
                    }
                    .package-code {
                        font-size: 12px;
                        font-weight: 600;
                        color: #1e90ff;
                    }
                "#}
            </style>
            <section class="hero">
                <h1>{"Websites that sell."}</h1>
                <p>{"Fast, considered builds from landing pages to custom platforms."}</p>
            </section>
            <section id="packages" class="packages">
                { for PACKAGES.iter().map(|package| html! {
                    <div class="package" key={package.code}>
                        <div class="package-code">{package.code}</div>
                        <h3>{package.name}</h3>
                    </div>
                }) }
            </section>
            <Testimonials />
            <FomoToasts position={ToastPosition::BottomRight} />
        </div>
    }
}

#[function_component(NotFound)]
pub fn not_found() -> Html {
    html! {
        <div class="home" style="padding: 120px 16px; text-align: center;">
            <h1>{"Page not found"}</h1>
            <Link<Route> to={Route::Home}>{"Back home"}</Link<Route>>
        </div>
    }
}
