//! Sold-lot filtering.

use lotharvest_shared::Listing;

/// Keep only lots that sold: `sold_price` present and truthy. Order is kept.
pub fn retain_sold(listings: Vec<Listing>) -> Vec<Listing> {
    listings.into_iter().filter(Listing::is_sold).collect()
}
