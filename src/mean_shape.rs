use crate::error::{Error, Result};
use crate::types::{Point, Shape};

/// Check that every shape in a batch carries the same number of landmarks.
///
/// The first shape fixes the expected count; the first file that disagrees
/// is named in the error.
pub fn validate_batch<'a, I>(shapes: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a str, &'a Shape)>,
{
    let mut expected = None;
    for (name, shape) in shapes {
        let found = shape.num_landmarks();
        match expected {
            None => expected = Some(found),
            Some(n) if n != found => {
                return Err(Error::LandmarkCountMismatch {
                    name: name.to_string(),
                    expected: n,
                    found,
                })
            }
            Some(_) => {}
        }
    }
    expected.ok_or(Error::NoUsableImages)
}

/// Landmark-wise arithmetic mean of a batch of shapes.
///
/// Sums run in `f64`, so the input order only affects the result below `f32`
/// precision. A single shape comes back unchanged.
pub fn average_points(shapes: &[Shape]) -> Result<Shape> {
    let first = shapes.first().ok_or(Error::NoUsableImages)?;
    let n = first.num_landmarks();

    let mut sums = vec![(0.0f64, 0.0f64); n];
    for (idx, shape) in shapes.iter().enumerate() {
        if shape.num_landmarks() != n {
            return Err(Error::LandmarkCountMismatch {
                name: format!("shape #{idx}"),
                expected: n,
                found: shape.num_landmarks(),
            });
        }
        for (sum, p) in sums.iter_mut().zip(shape.points.iter()) {
            sum.0 += p.x as f64;
            sum.1 += p.y as f64;
        }
    }

    let count = shapes.len() as f64;
    Ok(Shape::new(
        sums.into_iter()
            .map(|(x, y)| Point::new((x / count) as f32, (y / count) as f32))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(coords: &[(f32, f32)]) -> Shape {
        Shape::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn pairs_average_per_index() {
        let a = shape(&[(0.0, 0.0), (2.0, 2.0)]);
        let b = shape(&[(2.0, 2.0), (0.0, 0.0)]);
        let mean = average_points(&[a, b]).unwrap();
        assert_eq!(mean, shape(&[(1.0, 1.0), (1.0, 1.0)]));
    }

    #[test]
    fn single_shape_is_returned_unchanged() {
        let a = shape(&[(0.1, 0.7), (123.456, 99.9), (1e-3, 5e5)]);
        assert_eq!(average_points(std::slice::from_ref(&a)).unwrap(), a);
    }

    #[test]
    fn order_does_not_matter() {
        let shapes = vec![
            shape(&[(0.1, 10.3), (5.5, 7.25), (301.7, 2.2)]),
            shape(&[(17.9, 1.0), (0.3, 99.1), (12.0, 12.0)]),
            shape(&[(4.4, 3.3), (250.0, 0.01), (0.5, 480.9)]),
            shape(&[(1e-4, 77.7), (33.3, 33.3), (66.6, 6.6)]),
        ];
        let forward = average_points(&shapes).unwrap();

        let permutations: [[usize; 4]; 3] = [[3, 2, 1, 0], [1, 3, 0, 2], [2, 0, 3, 1]];
        for perm in permutations {
            let reordered: Vec<Shape> = perm.iter().map(|&i| shapes[i].clone()).collect();
            let mean = average_points(&reordered).unwrap();
            for (p, q) in mean.points.iter().zip(forward.points.iter()) {
                assert!((p.x - q.x).abs() < 1e-5);
                assert!((p.y - q.y).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn mismatched_counts_are_fatal() {
        let err = average_points(&[shape(&[(0.0, 0.0)]), shape(&[(0.0, 0.0), (1.0, 1.0)])])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::LandmarkCountMismatch { expected: 1, found: 2, .. }
        ));
    }

    #[test]
    fn empty_batch_is_fatal() {
        assert!(matches!(average_points(&[]), Err(Error::NoUsableImages)));
    }

    #[test]
    fn validate_names_offending_file() {
        let a = shape(&[(0.0, 0.0), (1.0, 1.0)]);
        let b = shape(&[(0.0, 0.0)]);
        let err = validate_batch([("a.jpg", &a), ("a2.jpg", &a), ("b.jpg", &b)]).unwrap_err();
        match err {
            Error::LandmarkCountMismatch { name, expected, found } => {
                assert_eq!(name, "b.jpg");
                assert_eq!((expected, found), (2, 1));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(validate_batch([("a.jpg", &a)]).unwrap(), 2);
    }
}
