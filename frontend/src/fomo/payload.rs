use rand::Rng;

/// One of the advertised service tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Package {
    pub code: &'static str,
    pub name: &'static str,
}

pub const PACKAGES: &[Package] = &[
    Package { code: "L0", name: "Landing Sprint" },
    Package { code: "L1", name: "Authority Site" },
    Package { code: "L2", name: "Storefront" },
    Package { code: "L3", name: "Custom Build" },
];

pub const QUOTES: &[&str] = &[
    "The team translated a fuzzy vision into a sharp, conversion-focused product. Stakeholders noticed the polish immediately, and our demo win rate climbed within the first week.",
    "Performance budgets were respected, scope was managed with care, and the final experience feels premium. It’s rare to see this level of craft and pace together.",
    "From kickoff to launch, communication was crisp and proactive. Every sprint shipped value, and our non-technical leads always knew what was coming next.",
    "They simplified complex requirements without losing intent. The result is elegant on the surface and thoughtfully engineered underneath—easy to maintain and genuinely fast.",
    "Our mobile metrics improved dramatically and the UX finally matches our brand. We’ve already seen a lift in form submissions and qualified pipeline.",
    "We expected a website; we got a product that sells. Clear messaging, clean information architecture, and a checkout that feels effortless.",
    "Analytics, events, and schema were configured correctly on the first pass. Marketing had trustworthy data on day one, and leadership loved the visibility.",
    "Design decisions were opinionated in the right places and flexible where it mattered. It feels tailor-made rather than assembled from parts.",
    "Hand-off was immaculate: documentation, component catalogue, and environment parity. Our internal team shipped their first iteration confidently the same afternoon.",
    "Page weight stayed lean, interactions are responsive, and accessibility wasn’t an afterthought. It’s obvious they care about the fundamentals.",
    "They protected the timeline without compromising quality. Trade-offs were explained clearly and the delivered scope aligned perfectly with business goals.",
    "The admin dashboards are a joy to use—role-aware, consistent, and fast. Support tickets dropped because the interface finally makes sense.",
    "We’ve worked with larger agencies; this was faster, calmer, and frankly better. The product looks luxurious while loading like a lightweight app.",
    "Their technical instincts saved us from future complexity. The codebase is tidy, predictable, and easy for our team to extend.",
    "Internationalization, SEO, and performance were treated as first-class concerns. We launched globally without the usual surprises.",
    "Clear priorities, disciplined execution, and tasteful micro-interactions. The experience feels premium without being flashy for the sake of it.",
    "They were ruthless about clarity in copy and structure. Bounce rate dropped and time-to-value improved across key flows.",
    "The storefront finally reflects our brand. Catalog is fast, checkout is smooth, and the numbers tell the story—revenue is up.",
    "We asked for speed and reliability; we got both. The product feels considered, not just assembled, and it shows in the results.",
    "An ideal partner: pragmatic, design-literate, and deeply technical. We’ll be back for the next build.",
];

pub fn pick_package<R: Rng + ?Sized>(rng: &mut R) -> Package {
    PACKAGES[rng.gen_range(0..PACKAGES.len())]
}

pub fn pick_quote<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    QUOTES[rng.gen_range(0..QUOTES.len())]
}
