use std::collections::HashSet;
use std::rc::Rc;

use gloo_timers::future::TimeoutFuture;
use yew::prelude::*;
use yew_hooks::use_interval;

use crate::config::FeedConfig;
use crate::fomo::engine::NotificationEngine;
use crate::fomo::queue::{initials, time_ago, DisplayEvent, Payload};
use crate::fomo::scheduler::TimerToken;
use crate::fomo::sync::{SyncHandler, SyncMessage};
use crate::fomo::web::{browser_capabilities, ViewportObserver, VisibilityListener};

const IN_VIEW_THRESHOLD: f64 = 0.05;

#[derive(Properties, PartialEq)]
pub struct TimeAgoProps {
    pub created_at: i64,
}

/// "12s ago", re-rendered every second.
#[function_component(TimeAgo)]
pub fn time_ago_label(props: &TimeAgoProps) -> Html {
    let now = use_state(|| chrono::Utc::now().timestamp_millis());
    {
        let now = now.clone();
        use_interval(move || now.set(chrono::Utc::now().timestamp_millis()), 1000);
    }
    let title = chrono::DateTime::<chrono::Utc>::from_timestamp(props.created_at / 1000, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default();

    html! {
        <time class="testimonial-time" {title}>{time_ago(props.created_at, *now)}</time>
    }
}

pub enum TestimonialsMsg {
    Hydrate,
    Timer(TimerToken),
    Remote(SyncMessage),
    VisibilityChanged,
    InView(bool),
    AvatarFailed(String),
}

/// Rotating three-card testimonial grid.
pub struct Testimonials {
    engine: NotificationEngine,
    section: NodeRef,
    broken_avatars: HashSet<String>,
    _visibility: Option<VisibilityListener>,
    _viewport: Option<ViewportObserver>,
}

impl Component for Testimonials {
    type Message = TestimonialsMsg;
    type Properties = ();

    fn create(ctx: &Context<Self>) -> Self {
        let config = FeedConfig::testimonials();
        let caps = browser_capabilities(&config, ctx.link().callback(TestimonialsMsg::Timer));
        Self {
            engine: NotificationEngine::new(config, caps),
            section: NodeRef::default(),
            broken_avatars: HashSet::new(),
            _visibility: VisibilityListener::attach(
                ctx.link().callback(|_| TestimonialsMsg::VisibilityChanged),
            ),
            _viewport: None,
        }
    }

    fn rendered(&mut self, ctx: &Context<Self>, first_render: bool) {
        if !first_render {
            return;
        }
        if let Some(section) = self.section.cast::<web_sys::Element>() {
            self._viewport = ViewportObserver::watch(
                &section,
                IN_VIEW_THRESHOLD,
                ctx.link().callback(TestimonialsMsg::InView),
            );
        }
        ctx.link().send_future(async {
            TimeoutFuture::new(0).await;
            TestimonialsMsg::Hydrate
        });
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            TestimonialsMsg::Hydrate => {
                let link = ctx.link().clone();
                let on_remote: SyncHandler =
                    Rc::new(move |m: SyncMessage| link.send_message(TestimonialsMsg::Remote(m)));
                self.engine.hydrate(on_remote);
                true
            }
            TestimonialsMsg::Timer(token) => {
                self.engine.on_timer(token);
                let visible: Vec<String> = self.engine.visible().map(|e| e.id.clone()).collect();
                self.broken_avatars.retain(|id| visible.contains(id));
                true
            }
            TestimonialsMsg::Remote(message) => {
                self.engine.apply_remote(message);
                false
            }
            TestimonialsMsg::VisibilityChanged => {
                self.engine.on_visibility_change();
                false
            }
            TestimonialsMsg::InView(in_view) => {
                self.engine.set_in_view(in_view);
                false
            }
            TestimonialsMsg::AvatarFailed(id) => self.broken_avatars.insert(id),
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <section ref={self.section.clone()} id="testimonials" class="testimonials" aria-labelledby="testimonials-title">
                <style>
                    {r#"
                        .testimonials {
                            padding: 64px 16px;
                            max-width: 1100px;
                            margin: 0 auto;
                        }
                        .testimonials h2 {
                            text-align: center;
                            font-size: 2rem;
                            font-weight: 600;
                            margin: 0;
                        }
                        .testimonials-lead {
                            text-align: center;
                            color: rgba(0, 0, 0, 0.6);
                            margin: 8px auto 24px;
                        }
                        .testimonial-grid {
                            display: grid;
                            gap: 24px;
                        }
                        @media (min-width: 768px) {
                            .testimonial-grid { grid-template-columns: repeat(3, 1fr); }
                        }
                        @keyframes cardIn {
                            from { opacity: 0; transform: translateY(12px); }
                            to { opacity: 1; transform: translateY(0); }
                        }
                        .testimonial-card {
                            margin: 0;
                            padding: 24px;
                            border-radius: 16px;
                            border: 1px solid rgba(0, 0, 0, 0.1);
                            background: #fff;
                            animation: cardIn 0.35s ease-out forwards;
                        }
                        .testimonial-head {
                            display: flex;
                            align-items: center;
                            gap: 12px;
                        }
                        .testimonial-avatar, .testimonial-initials {
                            width: 40px;
                            height: 40px;
                            flex-shrink: 0;
                            border-radius: 50%;
                        }
                        .testimonial-avatar { object-fit: cover; }
                        .testimonial-initials {
                            display: flex;
                            align-items: center;
                            justify-content: center;
                            font-size: 14px;
                            font-weight: 600;
                            background: linear-gradient(135deg, rgba(30, 144, 255, 0.2), #fff);
                        }
                        .testimonial-name {
                            font-size: 14px;
                            font-weight: 500;
                            color: rgba(0, 0, 0, 0.8);
                        }
                        .testimonial-time {
                            font-size: 11px;
                            color: rgba(0, 0, 0, 0.5);
                        }
                        .testimonial-stars {
                            margin-left: auto;
                            color: #f59e0b;
                            letter-spacing: 1px;
                        }
                        .testimonial-card blockquote {
                            margin: 12px 0 0;
                            font-size: 14px;
                            line-height: 1.6;
                            color: rgba(0, 0, 0, 0.8);
                        }
                    "#}
                </style>
                <h2 id="testimonials-title">{"What our clients say"}</h2>
                <p class="testimonials-lead">{"Real feedback from recent launches, refreshed as new results roll in."}</p>
                <div class="testimonial-grid">
                    { for self.engine.visible().map(|event| self.card(ctx, event)) }
                </div>
            </section>
        }
    }

    fn destroy(&mut self, _ctx: &Context<Self>) {
        self.engine.dispose();
    }
}

impl Testimonials {
    fn card(&self, ctx: &Context<Self>, event: &DisplayEvent) -> Html {
        let Payload::Testimonial { quote, rating } = &event.payload else {
            return html! {};
        };
        let avatar = if self.broken_avatars.contains(&event.id) {
            html! { <div class="testimonial-initials" aria-hidden="true">{initials(&event.name)}</div> }
        } else {
            let id = event.id.clone();
            let onerror = ctx
                .link()
                .callback(move |_: Event| TestimonialsMsg::AvatarFailed(id.clone()));
            html! {
                <img class="testimonial-avatar" src={event.avatar_url.clone()} alt={event.name.clone()} width="40" height="40" loading="lazy" {onerror} />
            }
        };
        let stars = "★".repeat(usize::from(*rating));

        html! {
            <figure key={event.id.clone()} class="testimonial-card">
                <div class="testimonial-head">
                    { avatar }
                    <div>
                        <figcaption class="testimonial-name">{&event.name}</figcaption>
                        <TimeAgo created_at={event.created_at} />
                    </div>
                    <div class="testimonial-stars" aria-label={format!("{} out of 5 stars", rating)}>{stars}</div>
                </div>
                <blockquote>{*quote}</blockquote>
            </figure>
        }
    }
}
