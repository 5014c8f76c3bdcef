//! Esquema Diesel (mantenido a mano junto a `migrations/`).

diesel::table! {
    temp_data (id) {
        id -> BigInt,
        kind -> Text,
        ts -> BigInt,
        properties -> Jsonb,
    }
}
