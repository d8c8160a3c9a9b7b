mod common;

use std::collections::HashSet;

use common::TestSite;
use htmldriver_drivers::{By, SearchContext};

#[tokio::test]
async fn same_node_found_twice_is_equal() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;

    let body = driver.find_element(&By::tag_name("body")).unwrap();
    let xpath_body = driver.find_element(&By::xpath("//body")).unwrap();
    assert_eq!(body, xpath_body);

    let set: HashSet<_> = [body.clone(), xpath_body].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[tokio::test]
async fn different_nodes_are_not_equal() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;
    let paragraphs = driver.find_elements(&By::tag_name("p")).unwrap();
    assert!(paragraphs.len() > 1);
    assert_ne!(paragraphs[0], paragraphs[1]);
}

#[tokio::test]
async fn elements_from_a_reload_are_new_handles() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;

    let before = driver.find_element(&By::id("oneline")).unwrap();
    driver.navigate().refresh().await.unwrap();
    let after = driver.find_element(&By::id("oneline")).unwrap();
    assert_ne!(before, after);
    assert_eq!(before.text(), after.text());
}

#[tokio::test]
async fn handles_keep_reading_the_page_they_came_from() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;

    let heading = driver.find_element(&By::tag_name("h1")).unwrap();
    driver.get(&site.url("/result.html")).await.unwrap();
    assert_eq!(heading.text(), "Heading");
    assert_eq!(driver.find_element(&By::tag_name("h1")).unwrap().text(), "Success!");
}

#[tokio::test]
async fn back_returns_the_same_page_instance() {
    let site = TestSite::start().await;
    let driver = site.open("/simple.html").await;

    let before = driver.find_element(&By::id("oneline")).unwrap();
    driver.get(&site.url("/result.html")).await.unwrap();
    driver.navigate().back();
    let after = driver.find_element(&By::id("oneline")).unwrap();
    assert_eq!(before, after);
}
