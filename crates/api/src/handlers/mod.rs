pub mod emergency;
