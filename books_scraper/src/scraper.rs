use crate::{error::Result, normalize_whitespace, parse_price, parse_rating, Book, ScrapeError};
use backoff::{future::retry, ExponentialBackoff};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{Html, Selector};
use std::{collections::HashSet, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str = concat!("books_scraper/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub url: Url,
}

#[derive(Debug)]
pub struct ListingPage {
    pub books: Vec<Book>,
    pub next: Option<Url>,
}

/// Crawls a books.toscrape.com style catalogue, one category listing at a time.
pub struct BooksScraper {
    client: Client,
    base_url: Url,
    concurrent_requests: usize,
    max_pages: Option<usize>,
    request_delay: Duration,
    max_retry_elapsed: Duration,
}

impl BooksScraper {
    pub fn new(base_url: &str, concurrent_requests: usize, max_pages: Option<usize>) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()?,
            base_url: Url::parse(base_url)?,
            concurrent_requests: concurrent_requests.max(1),
            max_pages,
            request_delay: Duration::from_millis(250),
            max_retry_elapsed: Duration::from_secs(60),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Scrapes every category and returns the books numbered from 1.
    pub async fn scrape(&self) -> Result<Vec<Book>> {
        info!(base_url = %self.base_url, "scraping catalogue");

        let home = self.fetch_with_retry(&self.base_url).await?;
        let categories = parse_categories(&home, &self.base_url)?;
        if categories.is_empty() {
            return Err(ScrapeError::message(format!(
                "no categories found at {}",
                self.base_url
            )));
        }
        info!(categories = categories.len(), "found categories");

        let results = stream::iter(categories)
            .map(|category| async move {
                let books = self.scrape_category(&category).await;
                (category, books)
            })
            .buffer_unordered(self.concurrent_requests)
            .collect::<Vec<_>>()
            .await;

        let mut books = Vec::new();
        for (category, result) in results {
            match result {
                Ok(mut found) => {
                    debug!(category = %category.name, books = found.len(), "category done");
                    books.append(&mut found);
                }
                Err(e) => {
                    warn!(category = %category.name, error = %e, "skipping category");
                }
            }
        }

        if books.is_empty() {
            return Err(ScrapeError::Empty(self.base_url.to_string()));
        }

        let books = number_books(books);
        info!(books = books.len(), "catalogue scraped");
        Ok(books)
    }

    async fn scrape_category(&self, category: &Category) -> Result<Vec<Book>> {
        let mut books = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(category.url.clone());

        while let Some(url) = next.take() {
            if self.max_pages.is_some_and(|max| visited.len() >= max) {
                break;
            }
            if !visited.insert(url.clone()) {
                break;
            }

            tokio::time::sleep(self.request_delay).await;

            let body = self.fetch_with_retry(&url).await?;
            let page = parse_listing(&body, &url, &category.name)?;
            books.extend(page.books);
            next = page.next;
        }

        Ok(books)
    }

    async fn fetch_with_retry(&self, url: &Url) -> Result<String> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..ExponentialBackoff::default()
        };

        retry(policy, || async {
            self.fetch(url).await.map_err(|e| {
                if e.is_transient() {
                    warn!(%url, error = %e, "request failed, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        debug!(%url, "fetching");
        let res = self.client.get(url.clone()).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(res.text().await?)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::selector(css, format!("{e:?}")))
}

/// Sorts by category then title and assigns ids starting at 1.
fn number_books(mut books: Vec<Book>) -> Vec<Book> {
    books.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.title.cmp(&b.title))
    });
    for (idx, book) in books.iter_mut().enumerate() {
        book.id = idx as u32 + 1;
    }
    books
}

/// Reads the category links from the home page sidebar.
pub fn parse_categories(html: &str, base_url: &Url) -> Result<Vec<Category>> {
    let doc = Html::parse_document(html);
    let links = selector("div.side_categories ul li ul li a")?;

    let mut categories = Vec::new();
    for el in doc.select(&links) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let name = normalize_whitespace(&el.text().collect::<String>());
        if name.is_empty() {
            continue;
        }
        categories.push(Category {
            name,
            url: base_url.join(href)?,
        });
    }

    Ok(categories)
}

/// Parses one listing page of a category into books plus the next page link.
pub fn parse_listing(html: &str, page_url: &Url, category: &str) -> Result<ListingPage> {
    let doc = Html::parse_document(html);
    let card_sel = selector("article.product_pod")?;
    let link_sel = selector("h3 a")?;
    let price_sel = selector("p.price_color")?;
    let rating_sel = selector("p.star-rating")?;
    let availability_sel = selector("p.availability")?;
    let image_sel = selector("div.image_container img")?;
    let next_sel = selector("li.next a")?;

    let mut books = Vec::new();
    for card in doc.select(&card_sel) {
        let Some(link) = card.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let product_url = page_url.join(href)?.to_string();

        let title = link
            .value()
            .attr("title")
            .map(normalize_whitespace)
            .unwrap_or_else(|| normalize_whitespace(&link.text().collect::<String>()));

        let price = card
            .select(&price_sel)
            .next()
            .map(|p| p.text().collect::<String>())
            .as_deref()
            .and_then(parse_price);
        let Some(price) = price else {
            warn!(%product_url, "skipping book without a price");
            continue;
        };

        let rating = card
            .select(&rating_sel)
            .next()
            .and_then(|p| p.value().classes().find(|c| *c != "star-rating").map(parse_rating))
            .unwrap_or(0);

        let in_stock = card
            .select(&availability_sel)
            .next()
            .map(|p| p.text().collect::<String>().to_lowercase().contains("in stock"))
            .unwrap_or(false);

        let image_url = card
            .select(&image_sel)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| page_url.join(src).ok())
            .map(|u| u.to_string());

        books.push(Book {
            id: 0,
            title,
            category: category.to_string(),
            price,
            rating,
            in_stock,
            product_url,
            image_url,
        });
    }

    let next = doc
        .select(&next_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| page_url.join(href))
        .transpose()?;

    Ok(ListingPage { books, next })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = r#"
        <html><body>
        <div class="side_categories">
          <ul class="nav nav-list">
            <li>
              <a href="catalogue/category/books_1/index.html">Books</a>
              <ul>
                <li><a href="catalogue/category/books/travel_2/index.html">
                    Travel
                </a></li>
                <li><a href="catalogue/category/books/mystery_3/index.html">Mystery</a></li>
              </ul>
            </li>
          </ul>
        </div>
        </body></html>
    "#;

    const LISTING: &str = r#"
        <html><body>
        <ol class="row">
          <li><article class="product_pod">
            <div class="image_container">
              <a href="../../../its-only-the-himalayas_981/index.html">
                <img src="../../../../media/cache/27/a5/27a53d0bb95bdd88288eaf66c9230d7e.jpg" class="thumbnail">
              </a>
            </div>
            <p class="star-rating Two"></p>
            <h3><a href="../../../its-only-the-himalayas_981/index.html" title="It's Only the Himalayas">It's Only the ...</a></h3>
            <div class="product_price">
              <p class="price_color">Â£45.17</p>
              <p class="instock availability"><i class="icon-ok"></i> In stock</p>
            </div>
          </article></li>
          <li><article class="product_pod">
            <p class="star-rating Five"></p>
            <h3><a href="../../../full-moon-over-noahs-ark_811/index.html" title="Full Moon over Noah’s Ark">Full Moon over ...</a></h3>
            <div class="product_price">
              <p class="price_color">£49.43</p>
              <p class="availability">Out of stock</p>
            </div>
          </article></li>
          <li><article class="product_pod">
            <h3><a href="../../../no-price_1/index.html" title="No Price">No Price</a></h3>
          </article></li>
        </ol>
        <ul class="pager"><li class="next"><a href="page-2.html">next</a></li></ul>
        </body></html>
    "#;

    #[test]
    fn parses_sidebar_categories() {
        let base = Url::parse("https://books.toscrape.com/").unwrap();
        let categories = parse_categories(HOME, &base).unwrap();

        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "Travel");
        assert_eq!(
            categories[0].url.as_str(),
            "https://books.toscrape.com/catalogue/category/books/travel_2/index.html"
        );
        assert_eq!(categories[1].name, "Mystery");
    }

    #[test]
    fn parses_product_cards() {
        let page_url =
            Url::parse("https://books.toscrape.com/catalogue/category/books/travel_2/index.html")
                .unwrap();
        let page = parse_listing(LISTING, &page_url, "Travel").unwrap();

        assert_eq!(page.books.len(), 2, "card without a price is skipped");

        let first = &page.books[0];
        assert_eq!(first.title, "It's Only the Himalayas");
        assert_eq!(first.category, "Travel");
        assert_eq!(first.price, 45.17);
        assert_eq!(first.rating, 2);
        assert!(first.in_stock);
        assert_eq!(
            first.product_url,
            "https://books.toscrape.com/catalogue/its-only-the-himalayas_981/index.html"
        );
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://books.toscrape.com/media/cache/27/a5/27a53d0bb95bdd88288eaf66c9230d7e.jpg")
        );

        let second = &page.books[1];
        assert_eq!(second.rating, 5);
        assert!(!second.in_stock);
        assert!(second.image_url.is_none());
    }

    #[test]
    fn follows_next_link() {
        let page_url =
            Url::parse("https://books.toscrape.com/catalogue/category/books/travel_2/index.html")
                .unwrap();
        let page = parse_listing(LISTING, &page_url, "Travel").unwrap();

        assert_eq!(
            page.next.unwrap().as_str(),
            "https://books.toscrape.com/catalogue/category/books/travel_2/page-2.html"
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let page_url = Url::parse("https://books.toscrape.com/page-50.html").unwrap();
        let page = parse_listing("<html><body></body></html>", &page_url, "Travel").unwrap();

        assert!(page.books.is_empty());
        assert!(page.next.is_none());
    }

    #[test]
    fn numbers_books_by_category_then_title() {
        let book = |title: &str, category: &str| Book {
            id: 0,
            title: title.into(),
            category: category.into(),
            price: 10.0,
            rating: 3,
            in_stock: true,
            product_url: format!("https://example.com/{title}"),
            image_url: None,
        };

        let numbered = number_books(vec![
            book("Zen", "Travel"),
            book("Alpha", "Travel"),
            book("Middle", "Mystery"),
        ]);

        let ids: Vec<_> = numbered.iter().map(|b| (b.id, b.title.as_str())).collect();
        assert_eq!(ids, vec![(1, "Middle"), (2, "Alpha"), (3, "Zen")]);
    }

    #[test]
    fn new_rejects_invalid_base_url() {
        assert!(matches!(
            BooksScraper::new("not a url", 2, None),
            Err(ScrapeError::Url(_))
        ));
    }
}
