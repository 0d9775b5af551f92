//! Demo profile data.
//!
//! Loads three customers (one card and one address each) and one unowned
//! card and address. Everything goes through the regular create paths, so
//! ids are freshly generated.

use crate::model::attributes::{Address, Card};
use crate::model::user::{User, UserProfile};
use crate::repo::error::ProfileResult;
use crate::service::profile_store::ProfileStore;
use crate::store::DocumentStore;
use log::info;

/// Outcome of [`seed_demo_profiles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Store already had customers; nothing written.
    Skipped,
    Seeded { customers: usize },
}

struct DemoCustomer {
    first_name: &'static str,
    last_name: &'static str,
    username: &'static str,
    password: &'static str,
    salt: &'static str,
    card: (&'static str, &'static str, &'static str),
    address: (&'static str, &'static str, &'static str, &'static str),
}

const DEMO_CUSTOMERS: [DemoCustomer; 3] = [
    DemoCustomer {
        first_name: "Eve",
        last_name: "Berger",
        username: "Eve_Berger",
        password: "fec51acb3365747fc61247da5e249674cf8463c2",
        salt: "c748112bc027878aa62812ba1ae00e40ad46d497",
        card: ("5953580604169678", "08/19", "678"),
        address: ("246", "Whitelees Road", "Glasgow", "G67 3DL"),
    },
    DemoCustomer {
        first_name: "User",
        last_name: "Name",
        username: "user",
        password: "e2de7202bb2201842d041f6de201b10438369fb8",
        salt: "6c1c6176e8b455ef37da13d953df971c249d0d8e",
        card: ("5544154011345918", "08/19", "958"),
        address: ("246", "Whitelees Road", "Glasgow", "G67 3DL"),
    },
    DemoCustomer {
        first_name: "User1",
        last_name: "Name1",
        username: "user1",
        password: "8f31df4dcc25694aeb0c212118ae37bbd6e47bcd",
        salt: "bd832b0e10c6882deabc5e8e60a37689e2b708c2",
        card: ("0908415193175205", "08/19", "280"),
        address: ("4", "Maes-Y-Deri", "Aberdare", "CF44 6TF"),
    },
];

const DEMO_COUNTRY: &str = "United Kingdom";

impl DemoCustomer {
    fn to_user(&self) -> User {
        let (long_num, expires, ccv) = self.card;
        let (number, street, city, postcode) = self.address;
        User {
            profile: UserProfile {
                first_name: self.first_name.to_string(),
                last_name: self.last_name.to_string(),
                username: self.username.to_string(),
                password: self.password.to_string(),
                salt: self.salt.to_string(),
                ..UserProfile::default()
            },
            user_id: String::new(),
            cards: vec![Card::new(long_num, expires, ccv)],
            addresses: vec![Address::new(number, street, city, postcode, DEMO_COUNTRY)],
        }
    }
}

/// Seeds the demo profiles unless at least one customer exists.
pub fn seed_demo_profiles<S: DocumentStore>(store: &ProfileStore<S>) -> ProfileResult<SeedOutcome> {
    if !store.list_users(Some(1))?.is_empty() {
        info!("event=seed module=fixtures status=skipped reason=customers_present");
        return Ok(SeedOutcome::Skipped);
    }

    for demo in &DEMO_CUSTOMERS {
        store.create_user(&demo.to_user())?;
    }
    store.create_card(&Card::new("5429804235432", "04/16", "432"), None)?;
    store.create_address(&Address::new("3", "my road", "London", "", "UK"), None)?;

    info!(
        "event=seed module=fixtures status=ok customers={}",
        DEMO_CUSTOMERS.len()
    );
    Ok(SeedOutcome::Seeded {
        customers: DEMO_CUSTOMERS.len(),
    })
}
