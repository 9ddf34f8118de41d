use glam::{Vec2, Vec3};
use googletest::{expect_that, matchers::*};

use crate::geometry::{
  exit_edge_2d, height_on_triangle, point_in_poly_2d, triangle_area_2,
};

#[googletest::test]
fn triangle_area_2_signs_by_winding() {
  let a = Vec3::new(0.0, 0.0, 0.0);
  let b = Vec3::new(1.0, 0.0, 5.0);
  let c = Vec3::new(0.0, 1.0, -3.0);

  // Heights are irrelevant.
  expect_that!(triangle_area_2(a, b, c), eq(1.0));
  expect_that!(triangle_area_2(a, c, b), eq(-1.0));
  // Collinear points span no area.
  expect_that!(triangle_area_2(a, b, Vec3::new(2.0, 0.0, 0.0)), eq(0.0));
}

#[googletest::test]
fn point_in_poly_2d_includes_boundary() {
  let square = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
  ];

  expect_that!(point_in_poly_2d(Vec2::new(0.5, 0.5), &square), is_true());
  expect_that!(point_in_poly_2d(Vec2::new(1.0, 0.5), &square), is_true());
  expect_that!(point_in_poly_2d(Vec2::new(0.0, 0.0), &square), is_true());
  expect_that!(point_in_poly_2d(Vec2::new(1.1, 0.5), &square), is_false());
  expect_that!(point_in_poly_2d(Vec2::new(0.5, -0.1), &square), is_false());
}

#[googletest::test]
fn exit_edge_2d_finds_the_crossed_edge() {
  let square = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
  ];
  let center = Vec2::new(0.5, 0.5);

  expect_that!(
    exit_edge_2d(&square, center, Vec2::new(1.0, 0.0)),
    some(eq((1, 0.5)))
  );
  expect_that!(
    exit_edge_2d(&square, center, Vec2::new(0.0, -1.0)),
    some(eq((0, 0.5)))
  );
  expect_that!(
    exit_edge_2d(&square, center, Vec2::new(-1.0, 0.0)),
    some(eq((3, 0.5)))
  );
  expect_that!(exit_edge_2d(&square, center, Vec2::ZERO), none());
}

#[googletest::test]
fn exit_edge_2d_never_reports_a_crossing_behind_the_start() {
  let square = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
  ];
  // Starting exactly on the left edge and moving right must exit through
  // the right edge, one full unit away.
  let (edge, t) =
    exit_edge_2d(&square, Vec2::new(0.0, 0.5), Vec2::new(1.0, 0.0)).unwrap();
  expect_that!(edge, eq(1));
  expect_that!(t, eq(1.0));
}

#[googletest::test]
fn height_on_triangle_interpolates() {
  // The plane z = x.
  let triangle = (
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(1.0, 0.0, 1.0),
    Vec3::new(0.0, 1.0, 0.0),
  );
  expect_that!(
    height_on_triangle(triangle, Vec2::new(0.5, 0.25)),
    near(0.5, 1e-6)
  );
  expect_that!(
    height_on_triangle(triangle, Vec2::new(0.0, 0.75)),
    near(0.0, 1e-6)
  );
  // Interpolation extends past the triangle itself.
  expect_that!(
    height_on_triangle(triangle, Vec2::new(2.0, 0.0)),
    near(2.0, 1e-6)
  );
}
