//! Tools the research agents call

pub mod news_search;
pub mod stock_price;

pub use news_search::NewsSearchTool;
pub use stock_price::StockPriceTool;
