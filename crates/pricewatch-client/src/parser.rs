use pricewatch_core::error::AppError;
use pricewatch_core::models::{CrawlResult, PriceInfo, ResultStatus};
use scraper::{ElementRef, Html, Selector};

/// Extracts prices and availability from a rendered product page.
///
/// Reads the above-the-fold block (`.prod-atf`):
/// - a price container yields a `completed` result, or
///   `out-of-stock-temporary` when the out-of-stock label is shown;
/// - without a price container, the three "product not found" markers
///   together yield `out-of-stock-permanent`.
#[derive(Debug, Clone)]
pub struct ProductPageParser {
    title: Selector,
    main: Selector,
    price_container: Selector,
    original: Selector,
    sales: Selector,
    final_price: Selector,
    out_of_stock: Selector,
    not_found: [Selector; 3],
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::Generic(format!("Invalid selector '{css}': {e}")))
}

impl ProductPageParser {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            title: selector("title")?,
            main: selector(".prod-atf")?,
            price_container: selector(".prod-atf .price-container")?,
            original: selector(".original-price .price-amount")?,
            sales: selector(".sales-price .price-amount")?,
            final_price: selector(".final-price .price-amount")?,
            out_of_stock: selector(".out-of-stock-label")?,
            not_found: [
                selector(".prod-not-find-known__buy__options")?,
                selector(".prod-not-find-known__buy__info")?,
                selector(".prod-not-find-known__buy__btn")?,
            ],
        })
    }

    pub fn parse(&self, html: &str, sku_id: &str) -> Result<CrawlResult, AppError> {
        let doc = Html::parse_document(html);
        let product_name = doc
            .select(&self.title)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let Some(main) = doc.select(&self.main).next() else {
            return Err(AppError::ExtractionFailed(
                "Product information not found on page".into(),
            ));
        };

        if let Some(container) = doc.select(&self.price_container).next() {
            let price = PriceInfo {
                original: amount(&container, &self.original),
                sales: amount(&container, &self.sales),
                final_price: amount(&container, &self.final_price),
            };
            let status = if main.select(&self.out_of_stock).next().is_some() {
                ResultStatus::OutOfStockTemporary
            } else {
                ResultStatus::Completed
            };
            return Ok(CrawlResult {
                sku_id: sku_id.to_string(),
                price: Some(price),
                status,
                product_name,
                error: None,
            });
        }

        let discontinued = self
            .not_found
            .iter()
            .all(|marker| main.select(marker).next().is_some());
        if discontinued {
            return Ok(CrawlResult {
                sku_id: sku_id.to_string(),
                price: None,
                status: ResultStatus::OutOfStockPermanent,
                product_name,
                error: None,
            });
        }

        Err(AppError::ExtractionFailed(
            "Price information not found on page".into(),
        ))
    }
}

fn amount(container: &ElementRef<'_>, selector: &Selector) -> u64 {
    container
        .select(selector)
        .next()
        .map(|el| parse_amount(&el.text().collect::<String>()))
        .unwrap_or(0)
}

/// `"12,340원"` → `12340`. Unparseable text counts as 0.
pub fn parse_amount(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(atf: &str) -> String {
        format!(
            "<html><head><title> Mechanical Keyboard - Shop </title></head>\
             <body><div class=\"prod-atf\">{atf}</div></body></html>"
        )
    }

    const PRICES: &str = r#"
        <div class="price-container">
            <span class="original-price"><span class="price-amount">59,000원</span></span>
            <span class="sales-price"><span class="price-amount">49,000원</span></span>
            <span class="final-price"><span class="price-amount">45,900원</span></span>
        </div>"#;

    #[test]
    fn test_parse_prices() {
        let parser = ProductPageParser::new().unwrap();
        let result = parser.parse(&page(PRICES), "sku-1").unwrap();

        assert_eq!(result.sku_id, "sku-1");
        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.product_name, "Mechanical Keyboard - Shop");
        assert_eq!(
            result.price,
            Some(PriceInfo {
                original: 59_000,
                sales: 49_000,
                final_price: 45_900,
            })
        );
    }

    #[test]
    fn test_missing_price_parts_are_zero() {
        let parser = ProductPageParser::new().unwrap();
        let html = page(
            r#"<div class="price-container">
                 <span class="final-price"><span class="price-amount">9,900원</span></span>
               </div>"#,
        );
        let price = parser.parse(&html, "s").unwrap().price.unwrap();
        assert_eq!(price.original, 0);
        assert_eq!(price.sales, 0);
        assert_eq!(price.final_price, 9_900);
    }

    #[test]
    fn test_out_of_stock_label() {
        let parser = ProductPageParser::new().unwrap();
        let html = page(&format!("{PRICES}<div class=\"out-of-stock-label\">Sold out</div>"));
        let result = parser.parse(&html, "s").unwrap();
        assert_eq!(result.status, ResultStatus::OutOfStockTemporary);
        assert!(result.price.is_some());
    }

    #[test]
    fn test_discontinued_product() {
        let parser = ProductPageParser::new().unwrap();
        let html = page(
            r#"<div class="prod-not-find-known__buy__options"></div>
               <div class="prod-not-find-known__buy__info"></div>
               <div class="prod-not-find-known__buy__btn"></div>"#,
        );
        let result = parser.parse(&html, "s").unwrap();
        assert_eq!(result.status, ResultStatus::OutOfStockPermanent);
        assert_eq!(result.price, None);
    }

    #[test]
    fn test_partial_not_found_markers_fail() {
        let parser = ProductPageParser::new().unwrap();
        let html = page(r#"<div class="prod-not-find-known__buy__info"></div>"#);
        assert!(matches!(
            parser.parse(&html, "s"),
            Err(AppError::ExtractionFailed(_))
        ));
    }

    #[test]
    fn test_non_product_page_fails() {
        let parser = ProductPageParser::new().unwrap();
        let err = parser
            .parse("<html><body><h1>Access Denied</h1></body></html>", "s")
            .unwrap_err();
        assert!(err.to_string().contains("Product information not found"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12,340원"), 12_340);
        assert_eq!(parse_amount(" 1,000 "), 1_000);
        assert_eq!(parse_amount("free"), 0);
    }
}
