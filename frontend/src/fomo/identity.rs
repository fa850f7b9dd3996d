use std::collections::HashSet;

use rand::Rng;
use serde::Serialize;

use crate::fomo::gender::{Gender, GenderResolver};

pub const FIRST_NAMES: &[&str] = &[
    "Olivia", "Liam", "Noah", "Emma", "Sophia", "Lucas", "Amelia", "Mateo", "Mia", "Leo",
    "Isabella", "Ethan", "Ava", "Hugo", "Charlotte", "Samuel", "Chloe", "Arthur", "Sofia", "Luca",
    "Emily", "Benjamin", "Zoe", "Oscar", "Nora", "Daniel", "Camila", "Louis", "Elena", "Jack",
    "Valentina", "Theo", "Lily", "Alvaro", "Freya", "Max", "Jasper", "Alice", "Santiago", "Layla",
    "Alexander", "Ruby", "Diego", "Ivy", "Levi", "Poppy", "Nikolai", "Eva", "Mason", "Ariana",
    "Jonas", "Isla", "Gabriel", "Ines", "Felix", "Greta", "Olivier", "Helena", "Marco", "Yasmin",
];

const F: Gender = Gender::Female;
const M: Gender = Gender::Male;

pub const FIRST_NAME_GENDERS: &[(&str, Gender)] = &[
    ("Olivia", F), ("Liam", M), ("Noah", M), ("Emma", F), ("Sophia", F),
    ("Lucas", M), ("Amelia", F), ("Mateo", M), ("Mia", F), ("Leo", M),
    ("Isabella", F), ("Ethan", M), ("Ava", F), ("Hugo", M), ("Charlotte", F),
    ("Samuel", M), ("Chloe", F), ("Arthur", M), ("Sofia", F), ("Luca", M),
    ("Emily", F), ("Benjamin", M), ("Zoe", F), ("Oscar", M), ("Nora", F),
    ("Daniel", M), ("Camila", F), ("Louis", M), ("Elena", F), ("Jack", M),
    ("Valentina", F), ("Theo", M), ("Lily", F), ("Alvaro", M), ("Freya", F),
    ("Max", M), ("Jasper", M), ("Alice", F), ("Santiago", M), ("Layla", F),
    ("Alexander", M), ("Ruby", F), ("Diego", M), ("Ivy", F), ("Levi", M),
    ("Poppy", F), ("Nikolai", M), ("Eva", F), ("Mason", M), ("Ariana", F),
    ("Jonas", M), ("Isla", F), ("Gabriel", M), ("Ines", F), ("Felix", M),
    ("Greta", F), ("Olivier", M), ("Helena", F), ("Marco", M), ("Yasmin", F),
];

/// Known individuals whose gender must never be inferred.
pub const NAME_GENDER_OVERRIDES: &[(&str, Gender)] = &[("Nikita Chauhan", Gender::Female)];

const PURCHASE_SURNAMES: &[&str] = &[
    "Smith", "Johnson", "Brown", "Jones", "Taylor", "Williams", "Miller", "Wilson", "Clark", "Martin",
    "Dubois", "Laurent", "Rousseau", "Meyer", "Schmidt", "Fischer", "Weber", "Wagner", "Bianchi", "Romano",
    "Garcia", "Fernandez", "Lopez", "Rodriguez", "Sanchez", "Torres", "Perez", "Silva", "Gomez", "Navarro",
    "Andersson", "Hansen", "Nielsen", "Svensson", "van Dijk", "de Vries", "Jansen", "Bakker", "Kowalski", "Nowak",
    "Novak", "Petrovic", "Horvath", "Nagy", "Kovacs", "Ivanov", "Smirnov", "Yilmaz", "Demir", "Kaya",
    "Wang", "Li", "Zhang", "Chen", "Liu", "Tanaka", "Sato", "Suzuki", "Kim", "Park",
];

const TESTIMONIAL_SURNAMES: &[&str] = &[
    "Smith", "Johnson", "Brown", "Jones", "Taylor", "Williams", "Davies", "Miller", "Wilson", "Clark",
    "Martin", "Dubois", "Moreau", "Laurent", "Bernard", "Lefevre", "Fontaine", "Lambert", "Rousseau", "Simon",
    "Meyer", "Schmidt", "Schneider", "Fischer", "Weber", "Wagner", "Becker", "Hoffmann", "Keller", "Schultz",
    "Rossi", "Russo", "Esposito", "Bianchi", "Romano", "Greco", "Conti", "Marino", "Lombardi", "Ferrara",
    "Garcia", "Fernandez", "Lopez", "Martinez", "Rodriguez", "Sanchez", "Torres", "Perez", "Silva", "Gomez",
    "Castro", "Vargas", "Navarro", "Ortega", "Morales", "Herrera", "Diaz", "Cruz", "Ramos", "Delgado",
    "Andersson", "Johansson", "Hansen", "Nielsen", "Jensen", "Svensson", "van Dijk", "de Vries", "Jansen", "Bakker",
    "Kowalski", "Nowak", "Novak", "Popovic", "Petrovic", "Ilic", "Horvath", "Nagy", "Kovacs", "Stojanovic",
    "Haddad", "Mansour", "Aziz", "Saad", "Youssef", "Abdallah", "Ben Ali", "Hassan", "Omar", "Farouk",
    "Ivanov", "Smirnov", "Petrov", "Sokolov", "Volkov", "Popov", "Novikov", "Orlov", "Baranov", "Antonov",
    "Yilmaz", "Demir", "Kaya", "Acar", "Aslan", "Papadopoulos", "Nikolaidis", "Georgiou", "Poulos", "Kostas",
    "Wang", "Li", "Zhang", "Chen", "Liu", "Tanaka", "Sato", "Suzuki", "Kim", "Park", "Choi",
];

/// How a double-barrelled surname picks its second half.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Compound {
    /// Always the surname seven places further on.
    Offset,
    /// Any surname, falling back to the offset one when it repeats the first.
    Random,
}

/// Static name material for one widget. Swapping it touches nothing else.
#[derive(Debug, Clone, Copy)]
pub struct NamePool {
    pub first: &'static [&'static str],
    pub last: &'static [&'static str],
    pub compound: Compound,
    pub compound_probability: f64,
    /// Portraits available per gender in the avatar source.
    pub portrait_slots: u32,
}

pub const PURCHASE_POOL: NamePool = NamePool {
    first: FIRST_NAMES,
    last: PURCHASE_SURNAMES,
    compound: Compound::Offset,
    compound_probability: 0.18,
    portrait_slots: 100,
};

pub const TESTIMONIAL_POOL: NamePool = NamePool {
    first: FIRST_NAMES,
    last: TESTIMONIAL_SURNAMES,
    compound: Compound::Random,
    compound_probability: 0.20,
    portrait_slots: 96,
};

const NAME_RETRIES: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub name: String,
    pub avatar_url: String,
}

/// Keys the pool must not hand out right now.
#[derive(Debug, Clone, Default)]
pub struct Bans {
    pub names: HashSet<String>,
    pub avatars: HashSet<String>,
    /// Names the generator steers away from without rejecting them.
    pub steer: HashSet<String>,
}

impl Bans {
    fn avoids_name(&self, key: &str) -> bool {
        self.names.contains(key) || self.steer.contains(key)
    }
}

/// The 32-bit string hash the site has always used for portrait indices.
pub fn name_hash(s: &str) -> u32 {
    let mut acc: i32 = 0;
    for ch in s.chars() {
        let mut units = [0u16; 2];
        let unit = ch.encode_utf16(&mut units)[0] as i32;
        acc = acc.wrapping_shl(5).wrapping_sub(acc).wrapping_add(unit);
    }
    acc as u32
}

pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

impl NamePool {
    fn random_name<R: Rng + ?Sized>(&self, rng: &mut R) -> (&'static str, String) {
        let first = self.first[rng.gen_range(0..self.first.len())];
        let idx = rng.gen_range(0..self.last.len());
        let surname = self.last[idx];
        let offset = self.last[(idx + 7) % self.last.len()];

        let last = if rng.gen_bool(self.compound_probability) {
            let partner = match self.compound {
                Compound::Offset => offset,
                Compound::Random => {
                    let pick = self.last[rng.gen_range(0..self.last.len())];
                    if pick == surname { offset } else { pick }
                }
            };
            format!("{}-{}", surname, partner)
        } else {
            surname.to_string()
        };
        (first, last)
    }

    /// Draws a display name, retrying around names `avoid` rejects.
    ///
    /// After the retries run out it falls back to a middle initial, then to
    /// a digit suffix on the last drawn name. The result is always
    /// distinguishable but may still be one `avoid` rejects.
    pub fn unique_name<R, A>(&self, avoid: A, rng: &mut R) -> String
    where
        R: Rng + ?Sized,
        A: Fn(&str) -> bool,
    {
        let mut attempt = 0;
        loop {
            let (first, last) = self.random_name(rng);
            let full = format!("{} {}", first, last);
            if !avoid(&normalize(&full)) {
                return full;
            }
            if attempt < NAME_RETRIES {
                attempt += 1;
                continue;
            }

            let middle = char::from(b'A' + (name_hash(&full) % 26) as u8);
            let with_middle = format!("{} {}. {}", first, middle, last);
            if avoid(&normalize(&with_middle)) {
                return format!("{} {}", full, rng.gen_range(1..=9));
            }
            return with_middle;
        }
    }
}

pub struct IdentityPool {
    pool: NamePool,
}

impl IdentityPool {
    pub fn new(pool: NamePool) -> Self {
        Self { pool }
    }

    pub fn names(&self) -> &NamePool {
        &self.pool
    }

    /// Proposes a name/avatar pair with neither key banned.
    ///
    /// A banned avatar rejects the whole identity rather than swapping the
    /// portrait, so a name always maps to the same face. `None` once
    /// `attempts` identities have been rejected.
    pub fn propose<R: Rng + ?Sized>(
        &self,
        genders: &mut GenderResolver,
        bans: &Bans,
        attempts: usize,
        rng: &mut R,
    ) -> Option<Identity> {
        for _ in 0..attempts {
            let name = self.pool.unique_name(|key| bans.avoids_name(key), rng);
            if bans.names.contains(&normalize(&name)) {
                continue;
            }
            let avatar_url = genders.avatar_for(&name, self.pool.portrait_slots);
            if bans.avatars.contains(&normalize(&avatar_url)) {
                continue;
            }
            return Some(Identity { name, avatar_url });
        }
        None
    }

    pub fn alternate_avatar(&self, genders: &mut GenderResolver, name: &str, attempt: u32) -> String {
        genders.alternate_avatar(name, attempt, self.pool.portrait_slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fomo::codec::ObfuscationCodec;
    use crate::fomo::gender::GenderClassifier;
    use crate::fomo::store::{MemoryMedium, ObfuscatedStore};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::rc::Rc;

    fn genders() -> GenderResolver {
        let medium = Rc::new(MemoryMedium::new());
        let codec = Rc::new(ObfuscationCodec::with_iterations("pepper", "origin", 2));
        let store = ObfuscatedStore::new(medium, codec);
        GenderResolver::new(
            GenderClassifier::new(NAME_GENDER_OVERRIDES, FIRST_NAME_GENDERS),
            store,
            "genders",
        )
    }

    const SOLO_FIRST: &[&str] = &["Ada"];
    const SOLO_LAST: &[&str] = &["Lovelace"];

    const SOLO: NamePool = NamePool {
        first: SOLO_FIRST,
        last: SOLO_LAST,
        compound: Compound::Offset,
        compound_probability: 0.0,
        portrait_slots: 100,
    };

    #[test]
    fn hash_matches_known_values() {
        assert_eq!(name_hash(""), 0);
        assert_eq!(name_hash("a"), 97);
        // ((97 << 5) - 97) + 98
        assert_eq!(name_hash("ab"), 3105);
        let long = "Alexander Papadopoulos-Nikolaidis";
        assert_eq!(name_hash(long), name_hash(long));
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Olivia SMITH "), "olivia smith");
    }

    #[test]
    fn ladder_falls_back_to_middle_initial() {
        let mut rng = SmallRng::seed_from_u64(1);
        let name = SOLO.unique_name(|key| key == "ada lovelace", &mut rng);
        let middle = char::from(b'A' + (name_hash("Ada Lovelace") % 26) as u8);
        assert_eq!(name, format!("Ada {}. Lovelace", middle));
    }

    #[test]
    fn ladder_falls_back_to_digit_suffix() {
        let mut rng = SmallRng::seed_from_u64(2);
        let name = SOLO.unique_name(|key| !key.chars().last().unwrap().is_ascii_digit(), &mut rng);
        let digit = name.strip_prefix("Ada Lovelace ").unwrap();
        assert!(matches!(digit.parse::<u32>(), Ok(1..=9)));
    }

    #[test]
    fn compound_surnames_use_the_offset_partner() {
        let pool = NamePool {
            compound_probability: 1.0,
            ..PURCHASE_POOL
        };
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..50 {
            let (_, last) = pool.random_name(&mut rng);
            let (a, b) = last.split_once('-').unwrap();
            let idx = PURCHASE_SURNAMES.iter().position(|s| *s == a).unwrap();
            assert_eq!(b, PURCHASE_SURNAMES[(idx + 7) % PURCHASE_SURNAMES.len()]);
        }
    }

    #[test]
    fn random_compounds_never_repeat_a_surname() {
        let pool = NamePool {
            compound_probability: 1.0,
            ..TESTIMONIAL_POOL
        };
        let mut rng = SmallRng::seed_from_u64(4);
        for _ in 0..200 {
            let (_, last) = pool.random_name(&mut rng);
            let (a, b) = last.split_once('-').unwrap();
            assert_ne!(a, b);
        }
    }

    #[test]
    fn accepted_identities_avoid_every_ban() {
        let pool = IdentityPool::new(PURCHASE_POOL);
        let mut genders = genders();
        let mut rng = SmallRng::seed_from_u64(5);
        let mut bans = Bans::default();

        for _ in 0..300 {
            if let Some(identity) = pool.propose(&mut genders, &bans, 10, &mut rng) {
                let n = normalize(&identity.name);
                let a = normalize(&identity.avatar_url);
                assert!(!bans.names.contains(&n));
                assert!(!bans.avatars.contains(&a));
                bans.names.insert(n);
                bans.avatars.insert(a);
            }
        }
        assert!(bans.names.len() > 50);
    }

    #[test]
    fn banned_avatar_rejects_the_whole_identity() {
        let pool = IdentityPool::new(SOLO);
        let mut genders = genders();
        let mut rng = SmallRng::seed_from_u64(6);
        let avatar = genders.avatar_for("Ada Lovelace", 100);

        let mut bans = Bans::default();
        bans.avatars.insert(normalize(&avatar));
        assert_eq!(pool.propose(&mut genders, &bans, 10, &mut rng), None);
    }

    #[test]
    fn steered_names_are_avoided_but_not_banned() {
        let pool = IdentityPool::new(SOLO);
        let mut genders = genders();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut bans = Bans::default();
        bans.steer.insert("ada lovelace".to_string());

        let identity = pool.propose(&mut genders, &bans, 1, &mut rng).unwrap();
        assert_ne!(identity.name, "Ada Lovelace");
        assert!(identity.name.starts_with("Ada "));
    }
}
