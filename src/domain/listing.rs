use serde::Serialize;

/// Placeholder stored in any field that could not be extracted from a card.
pub const MISSING_FIELD: &str = "N/A";

/// Serialized field names are part of the response contract, so they
/// stay exactly as listed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub title: String,
    pub description: String,
    pub year: String,
    pub price: String,
    pub mileage: String,
    pub seller: String,
    pub location: String,
    pub url: String,
}

impl Default for Listing {
    fn default() -> Self {
        Self {
            title: MISSING_FIELD.to_string(),
            description: MISSING_FIELD.to_string(),
            year: MISSING_FIELD.to_string(),
            price: MISSING_FIELD.to_string(),
            mileage: MISSING_FIELD.to_string(),
            seller: MISSING_FIELD.to_string(),
            location: MISSING_FIELD.to_string(),
            url: MISSING_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingField {
    Title,
    Description,
    Year,
    Price,
    Mileage,
    Seller,
    Location,
    Url,
}

impl Listing {
    pub fn set(&mut self, field: ListingField, value: String) {
        match field {
            ListingField::Title => self.title = value,
            ListingField::Description => self.description = value,
            ListingField::Year => self.year = value,
            ListingField::Price => self.price = value,
            ListingField::Mileage => self.mileage = value,
            ListingField::Seller => self.seller = value,
            ListingField::Location => self.location = value,
            ListingField::Url => self.url = value,
        }
    }
}
