use std::collections::HashMap;
use std::rc::Rc;

use gloo_timers::future::TimeoutFuture;
use yew::prelude::*;

use crate::config::FeedConfig;
use crate::fomo::engine::NotificationEngine;
use crate::fomo::queue::{DisplayEvent, Payload};
use crate::fomo::scheduler::TimerToken;
use crate::fomo::sync::{SyncHandler, SyncMessage};
use crate::fomo::web::{browser_capabilities, VisibilityListener};

// one full cycle through the portrait slots
const MAX_AVATAR_RETRIES: u32 = 99;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum ToastPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl ToastPosition {
    fn inset(self) -> &'static str {
        match self {
            ToastPosition::BottomRight => "bottom: calc(clamp(12px, 2.4vw, 24px) + env(safe-area-inset-bottom)); right: calc(clamp(12px, 2.4vw, 24px) + env(safe-area-inset-right));",
            ToastPosition::BottomLeft => "bottom: calc(clamp(12px, 2.4vw, 24px) + env(safe-area-inset-bottom)); left: calc(clamp(12px, 2.4vw, 24px) + env(safe-area-inset-left));",
            ToastPosition::TopRight => "top: calc(clamp(12px, 2.4vw, 24px) + env(safe-area-inset-top)); right: calc(clamp(12px, 2.4vw, 24px) + env(safe-area-inset-right));",
            ToastPosition::TopLeft => "top: calc(clamp(12px, 2.4vw, 24px) + env(safe-area-inset-top)); left: calc(clamp(12px, 2.4vw, 24px) + env(safe-area-inset-left));",
        }
    }

    fn slide_class(self) -> &'static str {
        match self {
            ToastPosition::BottomRight | ToastPosition::TopRight => "fomo-toast from-right",
            ToastPosition::BottomLeft | ToastPosition::TopLeft => "fomo-toast from-left",
        }
    }
}

#[derive(Properties, PartialEq)]
pub struct FomoToastsProps {
    #[prop_or_default]
    pub position: ToastPosition,
}

pub enum FomoToastsMsg {
    Hydrate,
    Timer(TimerToken),
    Remote(SyncMessage),
    VisibilityChanged,
    Dismiss(String),
    AvatarFailed { id: String, name: String },
}

/// Purchase notifications in a corner of the viewport, one at a time.
pub struct FomoToasts {
    engine: NotificationEngine,
    avatar_retries: HashMap<String, (u32, String)>,
    _visibility: Option<VisibilityListener>,
}

impl Component for FomoToasts {
    type Message = FomoToastsMsg;
    type Properties = FomoToastsProps;

    fn create(ctx: &Context<Self>) -> Self {
        let config = FeedConfig::purchase_toasts();
        let caps = browser_capabilities(&config, ctx.link().callback(FomoToastsMsg::Timer));
        Self {
            engine: NotificationEngine::new(config, caps),
            avatar_retries: HashMap::new(),
            _visibility: VisibilityListener::attach(
                ctx.link().callback(|_| FomoToastsMsg::VisibilityChanged),
            ),
        }
    }

    fn rendered(&mut self, ctx: &Context<Self>, first_render: bool) {
        if first_render {
            // key derivation is slow; keep it off the first paint
            ctx.link().send_future(async {
                TimeoutFuture::new(0).await;
                FomoToastsMsg::Hydrate
            });
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            FomoToastsMsg::Hydrate => {
                let link = ctx.link().clone();
                let on_remote: SyncHandler =
                    Rc::new(move |m: SyncMessage| link.send_message(FomoToastsMsg::Remote(m)));
                self.engine.hydrate(on_remote);
                false
            }
            FomoToastsMsg::Timer(token) => {
                self.engine.on_timer(token);
                let visible: Vec<String> = self.engine.visible().map(|e| e.id.clone()).collect();
                self.avatar_retries.retain(|id, _| visible.contains(id));
                true
            }
            FomoToastsMsg::Remote(message) => {
                self.engine.apply_remote(message);
                false
            }
            FomoToastsMsg::VisibilityChanged => {
                self.engine.on_visibility_change();
                false
            }
            FomoToastsMsg::Dismiss(id) => {
                self.avatar_retries.remove(&id);
                self.engine.dismiss(&id)
            }
            FomoToastsMsg::AvatarFailed { id, name } => {
                let attempt = self.avatar_retries.get(&id).map(|(n, _)| n + 1).unwrap_or(1);
                if attempt > MAX_AVATAR_RETRIES {
                    return false;
                }
                let url = self.engine.alternate_avatar(&name, attempt);
                self.avatar_retries.insert(id, (attempt, url));
                true
            }
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        let position = ctx.props().position;
        html! {
            <div class="fomo-stack" style={position.inset()} aria-live="polite" aria-atomic="true">
                <style>
                    {r#"
                        .fomo-stack {
                            position: fixed;
                            z-index: 80;
                            display: flex;
                            flex-direction: column;
                            gap: 12px;
                            pointer-events: none;
                        }
                        @keyframes fomoInRight {
                            from { opacity: 0; transform: translate(12px, 12px) scale(0.98); }
                            to { opacity: 1; transform: translate(0, 0) scale(1); }
                        }
                        @keyframes fomoInLeft {
                            from { opacity: 0; transform: translate(-12px, 12px) scale(0.98); }
                            to { opacity: 1; transform: translate(0, 0) scale(1); }
                        }
                        .fomo-toast {
                            pointer-events: auto;
                            display: flex;
                            align-items: center;
                            gap: 12px;
                            width: min(92vw, 22rem);
                            padding: 12px 16px 12px 12px;
                            border-radius: 16px;
                            border: 1px solid rgba(0, 0, 0, 0.1);
                            background: rgba(255, 255, 255, 0.95);
                            box-shadow: 0 15px 35px -15px rgba(0, 0, 0, 0.25);
                            backdrop-filter: blur(8px);
                            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
                        }
                        .fomo-toast.from-right { animation: fomoInRight 0.28s ease-out forwards; }
                        .fomo-toast.from-left { animation: fomoInLeft 0.28s ease-out forwards; }
                        .fomo-avatar {
                            width: 40px;
                            height: 40px;
                            flex-shrink: 0;
                            border-radius: 50%;
                            object-fit: cover;
                        }
                        .fomo-body { min-width: 0; }
                        .fomo-name {
                            font-size: 14px;
                            font-weight: 500;
                            color: #000;
                            white-space: nowrap;
                            overflow: hidden;
                            text-overflow: ellipsis;
                        }
                        .fomo-line {
                            margin: 0;
                            font-size: 12px;
                            color: rgba(0, 0, 0, 0.7);
                            white-space: nowrap;
                            overflow: hidden;
                            text-overflow: ellipsis;
                        }
                        .fomo-view {
                            margin-left: auto;
                            padding: 6px 10px;
                            border-radius: 8px;
                            border: 1px solid rgba(0, 0, 0, 0.1);
                            font-size: 12px;
                            color: #000;
                            text-decoration: none;
                        }
                        .fomo-close {
                            border: none;
                            background: none;
                            color: rgba(0, 0, 0, 0.4);
                            cursor: pointer;
                            font-size: 16px;
                        }
                    "#}
                </style>
                { for self.engine.visible().map(|event| self.toast(ctx, event, position)) }
            </div>
        }
    }

    fn destroy(&mut self, _ctx: &Context<Self>) {
        self.engine.dispose();
    }
}

impl FomoToasts {
    fn toast(&self, ctx: &Context<Self>, event: &DisplayEvent, position: ToastPosition) -> Html {
        let Payload::Purchase { package } = &event.payload else {
            return html! {};
        };
        let src = self
            .avatar_retries
            .get(&event.id)
            .map(|(_, url)| url.clone())
            .unwrap_or_else(|| event.avatar_url.clone());
        let onerror = {
            let id = event.id.clone();
            let name = event.name.clone();
            ctx.link().callback(move |_: Event| FomoToastsMsg::AvatarFailed {
                id: id.clone(),
                name: name.clone(),
            })
        };
        let ondismiss = {
            let id = event.id.clone();
            ctx.link().callback(move |_: MouseEvent| FomoToastsMsg::Dismiss(id.clone()))
        };

        html! {
            <div key={event.id.clone()} class={position.slide_class()} role="status">
                <img class="fomo-avatar" src={src} alt={event.name.clone()} width="40" height="40" loading="lazy" {onerror} />
                <div class="fomo-body">
                    <div class="fomo-name">{"🛍 "}{&event.name}</div>
                    <p class="fomo-line">
                        {"just purchased "}<strong>{package.code}</strong>{" · "}{package.name}
                    </p>
                </div>
                <a href="/#packages" class="fomo-view">{"View"}</a>
                <button class="fomo-close" aria-label="Dismiss" onclick={ondismiss}>{"×"}</button>
            </div>
        }
    }
}
