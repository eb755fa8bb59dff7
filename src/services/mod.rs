pub mod bike_point_api;
