pub mod audit;
pub mod calendar;
pub mod dates;
pub mod defensibility;
pub mod draft;
pub mod pricing;
pub mod rental_limit;
pub mod valuation;
