// Domain layer: records, locators and the ports the scraper talks to.

pub mod locator;
pub mod model;
pub mod ports;
